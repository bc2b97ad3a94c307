//! Parquet encoding of record snapshots.
use std::sync::Arc;

use arrow::{
    array::{ArrayRef, Int32Array, Int64Array, StringArray},
    record_batch::RecordBatch,
};
use bytes::Bytes;
use parquet::{
    arrow::ArrowWriter,
    basic::{Compression, GzipLevel, ZstdLevel},
    errors::ParquetError,
    file::{metadata::KeyValue, properties::WriterProperties},
};
use snafu::{ResultExt, Snafu};

use crate::{
    key::PartitionKey,
    record::{Record, record_schema},
};

const CREATED_BY: &str = concat!("lake-ingestor version ", env!("CARGO_PKG_VERSION"));

/// Compression codec of the Parquet column chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParquetCompression {
    #[default]
    Zstd,
    Snappy,
    Lz4,
    Gzip,
    Uncompressed,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display("failed to build record batch"))]
    RecordBatch { source: arrow::error::ArrowError },
    #[snafu(display("failed to write parquet: {message}"))]
    Parquet {
        message: &'static str,
        source: ParquetError,
    },
}

impl ParquetCompression {
    fn codec(&self) -> Compression {
        match self {
            Self::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Self::Snappy => Compression::SNAPPY,
            Self::Lz4 => Compression::LZ4_RAW,
            Self::Gzip => Compression::GZIP(GzipLevel::default()),
            Self::Uncompressed => Compression::UNCOMPRESSED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
            Self::Gzip => "gzip",
            Self::Uncompressed => "uncompressed",
        }
    }
}

/// Builds the Arrow batch holding the records, in order.
pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch, EncodeError> {
    let raw = StringArray::from_iter_values(records.iter().map(|r| r.raw.as_str()));
    let event_id = StringArray::from_iter(records.iter().map(|r| r.event_id.as_deref()));
    let topic = StringArray::from_iter_values(records.iter().map(|r| r.topic.as_str()));
    let partition = Int32Array::from_iter_values(records.iter().map(|r| r.partition));
    let offset = Int64Array::from_iter_values(records.iter().map(|r| r.offset));
    let ingested_at = StringArray::from_iter_values(records.iter().map(|r| r.ingested_at.as_str()));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(raw),
        Arc::new(event_id),
        Arc::new(topic),
        Arc::new(partition),
        Arc::new(offset),
        Arc::new(ingested_at),
    ];

    RecordBatch::try_new(record_schema(), columns).context(RecordBatchSnafu {})
}

/// Encodes the records of a key as a single row group Parquet file.
pub fn encode_parquet(
    key: &PartitionKey,
    records: &[Record],
    compression: ParquetCompression,
) -> Result<Bytes, EncodeError> {
    let batch = records_to_batch(records)?;

    // Keep the partition values in the file so objects are inspectable on their own.
    let kv_metadata = vec![
        KeyValue::new("lake:topic".to_string(), key.topic.clone()),
        KeyValue::new("lake:tenant-id".to_string(), key.tenant.clone()),
        KeyValue::new("lake:project-tag".to_string(), key.project.clone()),
        KeyValue::new("lake:ds".to_string(), key.date.clone()),
        KeyValue::new("lake:record-count".to_string(), records.len().to_string()),
    ];

    let write_properties = WriterProperties::builder()
        .set_compression(compression.codec())
        .set_max_row_group_size(records.len().max(1))
        .set_key_value_metadata(kv_metadata.into())
        .set_created_by(CREATED_BY.to_string())
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), record_schema(), write_properties.into())
        .context(ParquetSnafu {
            message: "failed to create writer",
        })?;

    writer.write(&batch).context(ParquetSnafu {
        message: "failed to write batch",
    })?;

    let data = writer.into_inner().context(ParquetSnafu {
        message: "failed to finish file",
    })?;

    Ok(data.into())
}

#[cfg(test)]
mod tests {
    use arrow::array::Array;
    use parquet::{
        arrow::arrow_reader::ParquetRecordBatchReaderBuilder, file::reader::FileReader,
        file::serialized_reader::SerializedFileReader,
    };

    use super::*;

    fn records() -> Vec<Record> {
        (0..3)
            .map(|offset| Record {
                raw: format!("{{\"n\":{offset}}}"),
                event_id: (offset != 1).then(|| format!("e-{offset}")),
                topic: "continuum.events".to_string(),
                partition: 2,
                offset,
                ingested_at: "2025-08-28T10:00:00.000Z".to_string(),
            })
            .collect()
    }

    fn key() -> PartitionKey {
        PartitionKey::new("continuum.events", "GSG", "CSR", "2025-08-28")
    }

    #[test]
    fn test_encode_reads_back_in_order() {
        let data = encode_parquet(&key(), &records(), ParquetCompression::Zstd).unwrap();

        let reader = ParquetRecordBatchReaderBuilder::try_new(data)
            .unwrap()
            .build()
            .unwrap();
        let batches = reader.collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.schema().fields(), record_schema().fields());
        assert_eq!(batch.num_rows(), 3);

        let offsets = batch
            .column_by_name("offset")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(offsets.values().to_vec(), vec![0, 1, 2]);

        let event_ids = batch
            .column_by_name("event_id")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(event_ids.value(0), "e-0");
        assert!(event_ids.is_null(1));
    }

    #[test]
    fn test_encode_uses_single_row_group_and_codec() {
        let data = encode_parquet(&key(), &records(), ParquetCompression::Zstd).unwrap();
        let reader = SerializedFileReader::new(data).unwrap();
        let metadata = reader.metadata();

        assert_eq!(metadata.num_row_groups(), 1);
        let row_group = metadata.row_group(0);
        assert_eq!(row_group.num_rows(), 3);
        for column in row_group.columns() {
            assert!(matches!(column.compression(), Compression::ZSTD(_)));
        }
    }

    #[test]
    fn test_encode_writes_key_value_metadata() {
        let data = encode_parquet(&key(), &records(), ParquetCompression::Snappy).unwrap();
        let reader = SerializedFileReader::new(data).unwrap();
        let file_metadata = reader.metadata().file_metadata();

        assert!(
            file_metadata
                .created_by()
                .is_some_and(|c| c.starts_with("lake-ingestor"))
        );

        let kv = file_metadata.key_value_metadata().unwrap();
        let lookup = |name: &str| {
            kv.iter()
                .find(|entry| entry.key == name)
                .and_then(|entry| entry.value.clone())
        };
        assert_eq!(lookup("lake:tenant-id").as_deref(), Some("GSG"));
        assert_eq!(lookup("lake:ds").as_deref(), Some("2025-08-28"));
        assert_eq!(lookup("lake:record-count").as_deref(), Some("3"));
    }

    #[test]
    fn test_compression_names() {
        assert_eq!(ParquetCompression::default(), ParquetCompression::Zstd);
        assert_eq!(ParquetCompression::Lz4.as_str(), "lz4");
    }
}
