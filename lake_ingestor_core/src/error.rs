use lake_observability::ErrorKind;
use snafu::Snafu;

use crate::source::SourceError;

/// Errors that end an ingestor run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestorError {
    /// The consumer group could not be joined. Nothing was consumed.
    #[snafu(display("failed to subscribe"))]
    Subscribe { source: SourceError },
    /// The broker session broke while running. Buffers were drained.
    #[snafu(display("broker session failed"))]
    BrokerFatal { source: SourceError },
}

pub type Result<T, E = IngestorError> = std::result::Result<T, E>;

impl IngestorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Subscribe { source } | Self::BrokerFatal { source } => source.kind(),
        }
    }
}
