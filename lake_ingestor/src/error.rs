use lake_ingestor_core::{IngestorError, SourceError};
use lake_observability::{ErrorKind, ObservabilityError};
use snafu::Snafu;

/// Errors that stop the process with a non-zero exit code.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Invalid {name} argument: {message}"))]
    InvalidArgument { name: &'static str, message: String },
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Failed to create object store"))]
    ObjectStore { source: lake_object_store::Error },
    #[snafu(display("Failed to create broker consumer"))]
    Consumer { source: SourceError },
    #[snafu(display("Ingestor failed"))]
    Ingestor { source: IngestorError },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } | Self::Observability { .. } => ErrorKind::Configuration,
            Self::ObjectStore { source } => source.kind(),
            Self::Consumer { source } => source.kind(),
            Self::Ingestor { source } => source.kind(),
        }
    }
}
