#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use arrow::{
    array::{Array, Int32Array, Int64Array, StringArray},
    record_batch::RecordBatch,
};
use async_trait::async_trait;
use bytesize::ByteSize;
use futures::TryStreamExt;
use lake_ingestor_core::{
    BrokerMessage, PartSink, PartitionKey, Record, WriteError, WrittenPart,
};
use object_store::{ObjectStore, path::Path};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

pub const TOPIC: &str = "continuum.events";
pub const BUCKET: &str = "lake";

pub fn envelope(tenant: &str, project: &str, occurred_at: &str, run_id: &str) -> String {
    format!(
        r#"{{"headers":{{"tenant_id":"{tenant}","project_tag":"{project}","occurred_at":"{occurred_at}","agent_run_id":"{run_id}"}},"payload":{{"x":1}}}}"#
    )
}

pub fn message(offset: i64, value: &str) -> BrokerMessage {
    BrokerMessage::new(TOPIC, 0, offset, value.as_bytes().to_vec())
}

pub fn tenant_message(offset: i64, tenant: &str) -> BrokerMessage {
    message(
        offset,
        &envelope(tenant, "CSR-EU-DE-2025", "2025-08-28T10:00:00Z", &format!("r{offset}")),
    )
}

/// A row read back from a written part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRow {
    pub raw: String,
    pub event_id: Option<String>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub ingested_at: String,
}

pub async fn list_parts(store: &dyn ObjectStore) -> Vec<Path> {
    let mut paths = store
        .list(None)
        .map_ok(|meta| meta.location)
        .try_collect::<Vec<_>>()
        .await
        .expect("list parts");
    paths.sort();
    paths
}

pub async fn read_part(store: &dyn ObjectStore, path: &Path) -> Vec<PartRow> {
    let data = store
        .get(path)
        .await
        .expect("get part")
        .bytes()
        .await
        .expect("read part");

    let reader = ParquetRecordBatchReaderBuilder::try_new(data)
        .expect("parquet reader")
        .build()
        .expect("parquet reader");

    reader
        .flat_map(|batch| rows(&batch.expect("record batch")))
        .collect()
}

fn rows(batch: &RecordBatch) -> Vec<PartRow> {
    let strings = |name: &str| {
        batch
            .column_by_name(name)
            .expect("column")
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("string column")
            .clone()
    };

    let raw = strings("_raw");
    let event_id = strings("event_id");
    let topic = strings("topic");
    let ingested_at = strings("ingested_at");
    let partition = batch
        .column_by_name("partition")
        .expect("column")
        .as_any()
        .downcast_ref::<Int32Array>()
        .expect("int32 column")
        .clone();
    let offset = batch
        .column_by_name("offset")
        .expect("column")
        .as_any()
        .downcast_ref::<Int64Array>()
        .expect("int64 column")
        .clone();

    (0..batch.num_rows())
        .map(|i| PartRow {
            raw: raw.value(i).to_string(),
            event_id: (!event_id.is_null(i)).then(|| event_id.value(i).to_string()),
            topic: topic.value(i).to_string(),
            partition: partition.value(i),
            offset: offset.value(i),
            ingested_at: ingested_at.value(i).to_string(),
        })
        .collect()
}

/// A sink that keeps written snapshots in memory and fails on demand.
#[derive(Default)]
pub struct RecordingSink {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    fail_next: usize,
    fail_always: bool,
    attempts: usize,
    written: Vec<(PartitionKey, Vec<i64>)>,
}

impl RecordingSink {
    pub fn failing_first(n: usize) -> Arc<Self> {
        let sink = Self::default();
        sink.state.lock().unwrap().fail_next = n;
        Arc::new(sink)
    }

    pub fn always_failing() -> Arc<Self> {
        let sink = Self::default();
        sink.state.lock().unwrap().fail_always = true;
        Arc::new(sink)
    }

    /// Offsets of every successful write, in write order.
    pub fn written(&self) -> Vec<(PartitionKey, Vec<i64>)> {
        self.state.lock().unwrap().written.clone()
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }
}

#[async_trait]
impl PartSink for RecordingSink {
    async fn write_part(
        &self,
        key: &PartitionKey,
        records: &[Record],
    ) -> Result<WrittenPart, WriteError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;

        let path = key.part_path(BUCKET, &format!("test-{}", state.attempts));

        if state.fail_always || state.fail_next > 0 {
            state.fail_next = state.fail_next.saturating_sub(1);
            return Err(WriteError::Timeout {
                path,
                timeout: Duration::from_secs(30),
            });
        }

        state
            .written
            .push((key.clone(), records.iter().map(|r| r.offset).collect()));

        Ok(WrittenPart {
            path,
            num_records: records.len(),
            size: ByteSize::b(0),
        })
    }
}
