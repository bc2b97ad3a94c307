use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::{
    ClientConfig, Message,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::{KafkaError, RDKafkaErrorCode},
};
use tracing::{debug, info};

use super::{BrokerMessage, MessageSource, SourceError};

const DEFAULT_AUTO_COMMIT_INTERVAL: Duration = Duration::from_secs(5);

/// Where a consumer group without a committed offset starts reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone)]
pub struct KafkaSourceOptions {
    pub bootstrap_servers: String,
    pub group_id: String,
    pub topics: Vec<String>,
    pub auto_offset_reset: OffsetReset,
    pub auto_commit_interval: Duration,
}

/// A consumer group member backed by librdkafka.
///
/// Offsets are committed in the background by librdkafka, so a message is only
/// counted as consumed some time after it was delivered.
pub struct KafkaMessageSource {
    consumer: StreamConsumer,
    topics: Vec<String>,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

impl KafkaSourceOptions {
    pub fn new(
        bootstrap_servers: impl Into<String>,
        group_id: impl Into<String>,
        topics: Vec<String>,
    ) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            group_id: group_id.into(),
            topics,
            auto_offset_reset: OffsetReset::default(),
            auto_commit_interval: DEFAULT_AUTO_COMMIT_INTERVAL,
        }
    }

    pub fn with_auto_offset_reset(mut self, auto_offset_reset: OffsetReset) -> Self {
        self.auto_offset_reset = auto_offset_reset;
        self
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                self.auto_commit_interval.as_millis().to_string(),
            )
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set("enable.partition.eof", "false");
        config
    }
}

impl KafkaMessageSource {
    pub fn new(options: KafkaSourceOptions) -> Result<Self, SourceError> {
        let consumer: StreamConsumer =
            options
                .client_config()
                .create()
                .map_err(|err| SourceError::Create {
                    message: err.to_string(),
                })?;

        Ok(Self {
            consumer,
            topics: options.topics,
        })
    }
}

#[async_trait]
impl MessageSource for KafkaMessageSource {
    async fn subscribe(&mut self) -> Result<(), SourceError> {
        let topics = self.topics.iter().map(String::as_str).collect::<Vec<_>>();

        self.consumer
            .subscribe(&topics)
            .map_err(|err| SourceError::Subscribe {
                topics: self.topics.clone(),
                message: err.to_string(),
            })?;

        info!(topics = ?self.topics, "subscribed");
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, SourceError> {
        let Ok(received) = tokio::time::timeout(timeout, self.consumer.recv()).await else {
            return Ok(None);
        };

        let message = received.map_err(classify_error)?;

        Ok(Some(BrokerMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(Bytes::copy_from_slice),
        }))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => {}
            Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => {
                debug!("no offsets to commit on close");
            }
            Err(err) => {
                return Err(SourceError::Close {
                    message: err.to_string(),
                });
            }
        }

        self.consumer.unsubscribe();
        Ok(())
    }
}

fn classify_error(err: KafkaError) -> SourceError {
    let fatal = matches!(
        err,
        KafkaError::Canceled | KafkaError::MessageConsumptionFatal(_)
    ) || err.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal);

    if fatal {
        SourceError::Fatal {
            message: err.to_string(),
        }
    } else {
        SourceError::Transient {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config() {
        let options = KafkaSourceOptions::new(
            "localhost:19092",
            "lake-ingestor",
            vec!["continuum.events".to_string()],
        )
        .with_auto_offset_reset(OffsetReset::Latest);
        let config = options.client_config();

        assert_eq!(config.get("bootstrap.servers"), Some("localhost:19092"));
        assert_eq!(config.get("group.id"), Some("lake-ingestor"));
        assert_eq!(config.get("enable.auto.commit"), Some("true"));
        assert_eq!(config.get("auto.commit.interval.ms"), Some("5000"));
        assert_eq!(config.get("auto.offset.reset"), Some("latest"));
    }

    #[test]
    fn test_partition_eof_is_transient() {
        let err = classify_error(KafkaError::PartitionEOF(0));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_code_is_fatal() {
        let err = classify_error(KafkaError::MessageConsumption(RDKafkaErrorCode::Fatal));
        assert!(err.is_fatal());

        let err = classify_error(KafkaError::Canceled);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_fatal_consumption_event_is_fatal() {
        let err = classify_error(KafkaError::MessageConsumptionFatal(
            RDKafkaErrorCode::InvalidArgument,
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_other_consumption_errors_are_transient() {
        let err = classify_error(KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure,
        ));
        assert!(!err.is_fatal());
    }
}
