//! Message sources.
//!
//! The ingestor reads from a [`MessageSource`]: a Kafka consumer group in
//! production, or a [`ScriptedSource`] that replays a fixed sequence of polls.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lake_observability::ErrorKind;
use snafu::Snafu;

pub use self::kafka::{KafkaMessageSource, KafkaSourceOptions, OffsetReset};
pub use self::scripted::{ScriptedPoll, ScriptedSource, SourceProbe};

mod kafka;
mod scripted;

/// A message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// The message value. `None` for tombstones.
    pub payload: Option<Bytes>,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SourceError {
    #[snafu(display("failed to create consumer: {message}"))]
    Create { message: String },
    #[snafu(display("failed to subscribe to {topics:?}: {message}"))]
    Subscribe {
        topics: Vec<String>,
        message: String,
    },
    /// The poll failed but the session is still usable.
    #[snafu(display("transient broker error: {message}"))]
    Transient { message: String },
    /// The session cannot make progress anymore.
    #[snafu(display("fatal broker error: {message}"))]
    Fatal { message: String },
    #[snafu(display("failed to close consumer: {message}"))]
    Close { message: String },
}

#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Joins the consumer group on the configured topics.
    async fn subscribe(&mut self) -> Result<(), SourceError>;

    /// Waits up to `timeout` for the next message.
    ///
    /// Returns `Ok(None)` when no message arrived in time.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BrokerMessage>, SourceError>;

    /// Commits the consumer position and leaves the group.
    async fn close(&mut self) -> Result<(), SourceError>;
}

impl BrokerMessage {
    pub fn new(
        topic: impl Into<String>,
        partition: i32,
        offset: i64,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: Some(payload.into()),
        }
    }

    pub fn tombstone(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: None,
        }
    }
}

impl SourceError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transient { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Create { .. } => ErrorKind::Configuration,
            Self::Transient { .. } => ErrorKind::Temporary,
            Self::Subscribe { .. } | Self::Fatal { .. } | Self::Close { .. } => {
                ErrorKind::Internal
            }
        }
    }
}
