use std::sync::Arc;

use clap::Parser;
use lake_ingestor_core::{
    Ingestor, ParquetPartWriter,
    source::KafkaMessageSource,
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    config::{IngestorArgs, IngestorConfig},
    error::{ConsumerSnafu, IngestorSnafu, ObjectStoreSnafu, ObservabilitySnafu, Result},
};

mod config;
mod error;

#[derive(Parser)]
#[command(name = "lake-ingestor")]
#[command(about = "Streams broker events into Parquet objects in the lake")]
#[command(version)]
struct Cli {
    #[clap(flatten)]
    args: IngestorArgs,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    lake_observability::init_observability(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .context(ObservabilitySnafu {})?;

    let config = load_config(cli.args)?;

    let ct = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(ct.clone()));

    run(config, ct).await.inspect_err(|err| {
        error!(kind = %err.kind(), error = %snafu::Report::from_error(err), "lake ingestor failed");
    })
}

fn load_config(args: IngestorArgs) -> Result<IngestorConfig> {
    args.into_config().inspect_err(|err| {
        error!(kind = %err.kind(), error = %err, "config_invalid");
    })
}

async fn run(config: IngestorConfig, ct: CancellationToken) -> Result<()> {
    info!(
        brokers = %config.kafka.bootstrap_servers,
        group_id = %config.kafka.group_id,
        topics = ?config.kafka.topics,
        bucket = %config.store.bucket,
        backend = ?config.store.backend,
        batch_size = config.ingestor.flush_policy.size_threshold,
        flush_interval = ?config.ingestor.flush_policy.age_threshold,
        compression = config.compression.as_str(),
        "starting lake ingestor"
    );

    let store = config
        .store
        .create_object_store()
        .context(ObjectStoreSnafu {})?;

    let writer = ParquetPartWriter::new(store, config.store.bucket.clone())
        .with_compression(config.compression)
        .with_write_timeout(config.write_timeout);

    let source = KafkaMessageSource::new(config.kafka).context(ConsumerSnafu {})?;

    let mut ingestor = Ingestor::new(source, Arc::new(writer), config.ingestor);
    let report = ingestor.run(ct).await.context(IngestorSnafu {})?;

    if report.records_discarded > 0 {
        warn!(
            records = report.records_discarded,
            parts = report.parts_failed,
            "records discarded during shutdown"
        );
    }

    Ok(())
}

/// Cancels the token on SIGINT or SIGTERM.
async fn cancel_on_shutdown_signal(ct: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "shutdown requested"),
        _ = terminate => info!(signal = "SIGTERM", "shutdown requested"),
    }

    ct.cancel();
}
