use std::time::Duration;

use clap::{Args, ValueEnum};
use lake_ingestor_core::{
    FlushPolicy, IngestorOptions, ParquetCompression, WriteFailurePolicy,
    options::DEFAULT_DRAIN_BACKOFF,
    source::{KafkaSourceOptions, OffsetReset},
};
use lake_object_store::{StoreBackend, StoreCredentials, StoreOptions};

use crate::error::{CliError, Result};

#[derive(Debug, Args)]
pub struct IngestorArgs {
    /// Comma separated list of broker addresses.
    #[arg(long, env = "BROKER_BOOTSTRAP", default_value = "localhost:19092")]
    broker_bootstrap: String,
    /// The consumer group to join.
    #[arg(long, env = "CONSUMER_GROUP_ID", default_value = "lake-ingestor")]
    consumer_group_id: String,
    /// Where to start when the group has no committed offset.
    #[arg(long, env = "AUTO_OFFSET_RESET", value_enum, default_value_t = OffsetResetArg::Earliest)]
    auto_offset_reset: OffsetResetArg,
    /// Comma separated list of topics to consume.
    #[arg(
        long,
        env = "TOPICS",
        value_delimiter = ',',
        default_value = "continuum.events,continuum.agent_runs,continuum.metrics"
    )]
    topics: Vec<String>,
    /// The bucket that holds the lake.
    #[arg(long, env = "LAKE_BUCKET", default_value = "lake")]
    lake_bucket: String,
    /// Flush once this many records are buffered across all keys.
    #[arg(long, env = "BATCH_SIZE", default_value_t = 100)]
    batch_size: usize,
    /// Flush once this many seconds passed since the last flush.
    #[arg(long, env = "FLUSH_INTERVAL_SECONDS", default_value_t = 30)]
    flush_interval_seconds: u64,
    /// Object store endpoint: `http(s)://` for S3-compatible stores,
    /// `file:///path` for a local directory, `memory://` for an in-memory store.
    #[arg(long, env = "STORE_ENDPOINT", default_value = "http://localhost:9000")]
    store_endpoint: String,
    #[arg(long, env = "STORE_ACCESS_KEY", hide_env_values = true)]
    store_access_key: Option<String>,
    #[arg(long, env = "STORE_SECRET_KEY", hide_env_values = true)]
    store_secret_key: Option<String>,
    #[arg(long, env = "STORE_REGION", default_value = "us-east-1")]
    store_region: String,
    /// How long a single poll waits for a message.
    #[arg(long, env = "POLL_TIMEOUT_MS", default_value_t = 1000)]
    poll_timeout_ms: u64,
    /// Upper bound of a single part upload.
    #[arg(long, env = "WRITE_TIMEOUT_SECONDS", default_value_t = 30)]
    write_timeout_seconds: u64,
    #[arg(long, env = "PARQUET_COMPRESSION", value_enum, default_value_t = CompressionArg::Zstd)]
    parquet_compression: CompressionArg,
    /// What to do with records whose write failed.
    #[arg(long, env = "WRITE_FAILURE_POLICY", value_enum, default_value_t = WriteFailurePolicyArg::Drop)]
    write_failure_policy: WriteFailurePolicyArg,
    /// Consecutive failed writes of a key before its records are dropped,
    /// with the `reinsert` policy.
    #[arg(long, env = "MAX_WRITE_ATTEMPTS", default_value_t = 3)]
    max_write_attempts: u32,
    /// Extra attempts of each write during the final drain.
    #[arg(long, env = "DRAIN_RETRIES", default_value_t = 2)]
    drain_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OffsetResetArg {
    Earliest,
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    Zstd,
    Snappy,
    Lz4,
    Gzip,
    Uncompressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteFailurePolicyArg {
    Drop,
    Reinsert,
}

/// The validated configuration of the process.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    pub kafka: KafkaSourceOptions,
    pub store: StoreOptions,
    pub ingestor: IngestorOptions,
    pub compression: ParquetCompression,
    pub write_timeout: Duration,
}

impl IngestorArgs {
    pub fn into_config(self) -> Result<IngestorConfig> {
        let topics = self
            .topics
            .iter()
            .map(|topic| topic.trim())
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();

        if topics.is_empty() {
            return invalid("topics", "at least one topic is required");
        }

        if self.broker_bootstrap.trim().is_empty() {
            return invalid("broker-bootstrap", "must not be empty");
        }

        if self.lake_bucket.trim().is_empty() {
            return invalid("lake-bucket", "must not be empty");
        }

        if self.batch_size == 0 {
            return invalid("batch-size", "must be at least 1");
        }

        if self.flush_interval_seconds == 0 {
            return invalid("flush-interval-seconds", "must be at least 1");
        }

        if self.poll_timeout_ms == 0 {
            return invalid("poll-timeout-ms", "must be at least 1");
        }

        if self.write_timeout_seconds == 0 {
            return invalid("write-timeout-seconds", "must be at least 1");
        }

        if self.max_write_attempts == 0 {
            return invalid("max-write-attempts", "must be at least 1");
        }

        let backend = StoreBackend::from_endpoint(&self.store_endpoint).map_err(|err| {
            CliError::InvalidArgument {
                name: "store-endpoint",
                message: err.to_string(),
            }
        })?;

        let credentials = match (self.store_access_key, self.store_secret_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StoreCredentials {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => {
                return invalid(
                    "store-access-key",
                    "access key and secret key must be set together",
                );
            }
        };

        if backend.requires_credentials() && credentials.is_none() {
            return invalid(
                "store-access-key",
                "credentials are required for S3-compatible endpoints",
            );
        }

        let write_timeout = Duration::from_secs(self.write_timeout_seconds);

        let kafka = KafkaSourceOptions::new(self.broker_bootstrap, self.consumer_group_id, topics)
            .with_auto_offset_reset(self.auto_offset_reset.into());

        let store = StoreOptions {
            backend,
            bucket: self.lake_bucket,
            region: self.store_region,
            credentials,
            request_timeout: write_timeout,
        };

        let write_failure_policy = match self.write_failure_policy {
            WriteFailurePolicyArg::Drop => WriteFailurePolicy::Drop,
            WriteFailurePolicyArg::Reinsert => WriteFailurePolicy::Reinsert {
                max_attempts: self.max_write_attempts,
            },
        };

        let ingestor = IngestorOptions::default()
            .with_poll_timeout(Duration::from_millis(self.poll_timeout_ms))
            .with_flush_policy(FlushPolicy::new(
                self.batch_size,
                Duration::from_secs(self.flush_interval_seconds),
            ))
            .with_write_failure_policy(write_failure_policy)
            .with_drain_retries(self.drain_retries, DEFAULT_DRAIN_BACKOFF);

        Ok(IngestorConfig {
            kafka,
            store,
            ingestor,
            compression: self.parquet_compression.into(),
            write_timeout,
        })
    }
}

fn invalid<T>(name: &'static str, message: &str) -> Result<T> {
    Err(CliError::InvalidArgument {
        name,
        message: message.to_string(),
    })
}

impl From<OffsetResetArg> for OffsetReset {
    fn from(value: OffsetResetArg) -> Self {
        match value {
            OffsetResetArg::Earliest => OffsetReset::Earliest,
            OffsetResetArg::Latest => OffsetReset::Latest,
        }
    }
}

impl From<CompressionArg> for ParquetCompression {
    fn from(value: CompressionArg) -> Self {
        match value {
            CompressionArg::Zstd => ParquetCompression::Zstd,
            CompressionArg::Snappy => ParquetCompression::Snappy,
            CompressionArg::Lz4 => ParquetCompression::Lz4,
            CompressionArg::Gzip => ParquetCompression::Gzip,
            CompressionArg::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}
