pub mod batcher;
pub mod envelope;
pub mod error;
pub mod ingestor;
pub mod key;
pub mod metrics;
pub mod options;
pub mod record;
pub mod source;
pub mod uploader;
pub mod writer;

pub use batcher::{BufferTable, FlushPolicy};
pub use envelope::{Accepted, DropReason, EnvelopeError, Headers, parse_message};
pub use error::IngestorError;
pub use ingestor::{DrainReport, Ingestor};
pub use key::{PartitionKey, partition_key, partition_key_at};
pub use metrics::IngestorStats;
pub use options::{IngestorOptions, WriteFailurePolicy};
pub use record::{Record, record_schema};
pub use source::{BrokerMessage, MessageSource, SourceError};
pub use uploader::{
    ParquetPartWriter, PartIdGenerator, PartSink, UnixSecondsPartIdGenerator, WriteError,
    WrittenPart,
};
pub use writer::ParquetCompression;
