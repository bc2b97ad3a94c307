use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytesize::ByteSize;
use lake_object_store::LakePath;
use lake_observability::ErrorKind;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use snafu::Snafu;
use tracing::{debug, warn};

use crate::{
    key::PartitionKey,
    record::Record,
    writer::{EncodeError, ParquetCompression, encode_parquet},
};

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// How many names a part tries before giving up on a collision.
pub const MAX_NAME_ATTEMPTS: usize = 3;

/// Trait for generating part ids.
pub trait PartIdGenerator: Send + Sync + 'static {
    /// Returns a new id for a part written now.
    fn generate_id(&self) -> String;

    /// Returns a longer id derived from one that collided.
    fn extend_id(&self, id: &str) -> String;
}

/// Generates `{unix_seconds}-{8 hex}` ids.
#[derive(Debug, Clone, Default)]
pub struct UnixSecondsPartIdGenerator;

/// The destination of flushed snapshots.
#[async_trait]
pub trait PartSink: Send + Sync + 'static {
    /// Writes the records of one key as a single object.
    async fn write_part(
        &self,
        key: &PartitionKey,
        records: &[Record],
    ) -> Result<WrittenPart, WriteError>;
}

#[derive(Debug, Clone)]
pub struct WrittenPart {
    pub path: LakePath,
    pub num_records: usize,
    pub size: ByteSize,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    #[snafu(display("refusing to write an empty part for key {key}"))]
    EmptyPart { key: PartitionKey },
    #[snafu(display("failed to encode part {path}"))]
    Encode { path: LakePath, source: EncodeError },
    #[snafu(display("failed to upload part {path}"))]
    Upload {
        path: LakePath,
        source: object_store::Error,
    },
    #[snafu(display("timed out after {timeout:?} uploading part {path}"))]
    Timeout { path: LakePath, timeout: Duration },
    #[snafu(display("part {path} already exists after {attempts} attempts"))]
    Collision { path: LakePath, attempts: usize },
}

/// Writes snapshots as Parquet objects with create-only semantics.
///
/// The store must be scoped to the bucket: objects are put at the bucket
/// relative key of their [`LakePath`].
#[derive(Clone)]
pub struct ParquetPartWriter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    compression: ParquetCompression,
    write_timeout: Duration,
    id_generator: Arc<dyn PartIdGenerator>,
}

impl ParquetPartWriter {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            compression: ParquetCompression::default(),
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            id_generator: Arc::new(UnixSecondsPartIdGenerator),
        }
    }

    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn PartIdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    async fn put_create(&self, path: &LakePath, payload: PutPayload) -> Result<(), WriteError> {
        let put = self.store.put_opts(
            &path.key,
            payload,
            PutOptions {
                mode: PutMode::Create,
                ..Default::default()
            },
        );

        match tokio::time::timeout(self.write_timeout, put).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(source)) => Err(WriteError::Upload {
                path: path.clone(),
                source,
            }),
            Err(_) => Err(WriteError::Timeout {
                path: path.clone(),
                timeout: self.write_timeout,
            }),
        }
    }
}

#[async_trait]
impl PartSink for ParquetPartWriter {
    async fn write_part(
        &self,
        key: &PartitionKey,
        records: &[Record],
    ) -> Result<WrittenPart, WriteError> {
        if records.is_empty() {
            return EmptyPartSnafu { key: key.clone() }.fail();
        }

        let mut part_id = self.id_generator.generate_id();
        let mut path = key.part_path(&self.bucket, &part_id);

        let data = encode_parquet(key, records, self.compression).map_err(|source| {
            WriteError::Encode {
                path: path.clone(),
                source,
            }
        })?;
        let size = ByteSize::b(data.len() as u64);

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            match self.put_create(&path, data.clone().into()).await {
                Ok(()) => {
                    debug!(%path, records = records.len(), %size, "part written");
                    return Ok(WrittenPart {
                        path,
                        num_records: records.len(),
                        size,
                    });
                }
                Err(WriteError::Upload {
                    source: object_store::Error::AlreadyExists { .. },
                    ..
                }) => {
                    if attempt == MAX_NAME_ATTEMPTS {
                        break;
                    }
                    warn!(%path, attempt, "part already exists, retrying with a longer name");
                    part_id = self.id_generator.extend_id(&part_id);
                    path = key.part_path(&self.bucket, &part_id);
                }
                Err(err) => return Err(err),
            }
        }

        CollisionSnafu {
            path,
            attempts: MAX_NAME_ATTEMPTS,
        }
        .fail()
    }
}

impl WriteError {
    pub fn path(&self) -> Option<&LakePath> {
        match self {
            Self::EmptyPart { .. } => None,
            Self::Encode { path, .. }
            | Self::Upload { path, .. }
            | Self::Timeout { path, .. }
            | Self::Collision { path, .. } => Some(path),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPart { .. } => ErrorKind::Validation,
            Self::Encode { .. } => ErrorKind::Internal,
            Self::Upload { .. } | Self::Timeout { .. } => ErrorKind::Temporary,
            Self::Collision { .. } => ErrorKind::Conflict,
        }
    }
}

impl PartIdGenerator for UnixSecondsPartIdGenerator {
    fn generate_id(&self) -> String {
        let seconds = chrono::Utc::now().timestamp();
        format!("{seconds}-{}", random_token())
    }

    fn extend_id(&self, id: &str) -> String {
        format!("{id}-{}", random_token())
    }
}

fn random_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(8);
    token
}
