use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use snafu::ResultExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    batcher::BufferTable,
    envelope::{DropReason, parse_message},
    error::{BrokerFatalSnafu, Result, SubscribeSnafu},
    key::PartitionKey,
    metrics::{IngestionMetrics, IngestorStats},
    options::{IngestorOptions, WriteFailurePolicy},
    record::Record,
    source::{BrokerMessage, MessageSource, SourceError},
    uploader::{PartSink, WriteError},
};

/// Consumes messages from a source and flushes them as Parquet parts.
///
/// All buffering happens on the task that drives the ingestor. Writes are
/// awaited inline, so no new message is polled while a flush cycle runs.
pub struct Ingestor<S> {
    source: S,
    sink: Arc<dyn PartSink>,
    options: IngestorOptions,
    buffers: BufferTable,
    last_flush: Instant,
    /// Consecutive failed writes per key, for the reinsert policy.
    write_failures: HashMap<PartitionKey, u32>,
    metrics: IngestionMetrics,
}

/// Outcome of the final drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub parts_written: usize,
    pub records_written: usize,
    pub parts_failed: usize,
    pub records_discarded: usize,
}

impl<S: MessageSource> Ingestor<S> {
    pub fn new(source: S, sink: Arc<dyn PartSink>, options: IngestorOptions) -> Self {
        Self {
            source,
            sink,
            options,
            buffers: BufferTable::default(),
            last_flush: Instant::now(),
            write_failures: HashMap::new(),
            metrics: IngestionMetrics::default(),
        }
    }

    pub fn buffers(&self) -> &BufferTable {
        &self.buffers
    }

    pub fn stats(&self) -> &IngestorStats {
        self.metrics.stats()
    }

    pub fn last_flush(&self) -> Instant {
        self.last_flush
    }

    /// Runs until `ct` is cancelled or the broker session fails, then drains
    /// every buffer and closes the session.
    pub async fn run(&mut self, ct: CancellationToken) -> Result<DrainReport> {
        info!(state = "INIT", "starting ingestor");

        if let Err(err) = self.source.subscribe().await {
            error!(state = "ERROR", error = %err, "failed to subscribe");
            return Err(err).context(SubscribeSnafu {});
        }
        info!(state = "SUBSCRIBED", "consumer group joined");

        self.last_flush = Instant::now();
        info!(state = "RUNNING", "consuming messages");

        let mut fatal = None;
        while !ct.is_cancelled() {
            if let Err(err) = self.tick().await {
                error!(state = "ERROR", error = %err, "fatal broker error");
                fatal = Some(err);
                break;
            }
        }

        info!(
            state = "DRAINING",
            records = self.buffers.total_count(),
            keys = self.buffers.key_count(),
            "draining buffers"
        );
        let report = self.drain().await;

        if let Err(err) = self.source.close().await {
            warn!(error = %err, "failed to close broker session cleanly");
        }

        info!(
            state = "CLOSED",
            parts_written = report.parts_written,
            records_written = report.records_written,
            parts_failed = report.parts_failed,
            records_discarded = report.records_discarded,
            "ingestor stopped"
        );

        match fatal {
            Some(err) => Err(err).context(BrokerFatalSnafu {}),
            None => Ok(report),
        }
    }

    /// Polls at most one message, buffers it and flushes if the policy says so.
    ///
    /// Only fatal broker errors are returned.
    pub async fn tick(&mut self) -> Result<(), SourceError> {
        match self.source.poll(self.options.poll_timeout).await {
            Ok(None) => {}
            Ok(Some(message)) => self.handle_message(message),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                debug!(error = %err, "transient broker error");
                return Ok(());
            }
        }

        self.maybe_flush().await;
        Ok(())
    }

    fn handle_message(&mut self, message: BrokerMessage) {
        self.metrics.message_received();

        match parse_message(&message, Utc::now()) {
            Ok(accepted) => {
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    key = %accepted.key,
                    "buffered message"
                );
                self.buffers.append(accepted.key, accepted.record);
            }
            Err(err) => {
                let reason = err.reason();
                match reason {
                    DropReason::MissingHeaders => warn!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        %reason,
                        error = %err,
                        "dropping message"
                    ),
                    DropReason::MalformedJson | DropReason::InternalError => error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        %reason,
                        error = %err,
                        "dropping message"
                    ),
                }
                self.metrics.message_dropped(reason);
            }
        }
    }

    /// Runs a flush cycle if the size or age trigger fired.
    pub async fn maybe_flush(&mut self) -> bool {
        let now = Instant::now();
        if !self
            .options
            .flush_policy
            .should_flush(self.buffers.total_count(), now, self.last_flush)
        {
            return false;
        }

        self.flush_cycle().await;
        true
    }

    /// Writes every buffered key, then resets the flush clock.
    pub async fn flush_cycle(&mut self) {
        let keys = self.buffers.iter_keys();
        if !keys.is_empty() {
            debug!(
                keys = keys.len(),
                records = self.buffers.total_count(),
                "flush cycle"
            );
        }

        for key in keys {
            let Some(records) = self.buffers.snapshot_and_clear(&key) else {
                continue;
            };

            match self.sink.write_part(&key, &records).await {
                Ok(part) => {
                    info!(path = %part.path, records = part.num_records, size = %part.size, "wrote part");
                    self.write_failures.remove(&key);
                    self.metrics.part_written(&part);
                }
                Err(err) => {
                    self.metrics.write_failed();
                    self.handle_write_failure(key, records, err);
                }
            }
        }

        self.last_flush = self.last_flush.max(Instant::now());
        self.metrics.flush_cycle();
    }

    fn handle_write_failure(&mut self, key: PartitionKey, records: Vec<Record>, err: WriteError) {
        let path = err.path().map(ToString::to_string);

        let WriteFailurePolicy::Reinsert { max_attempts } = self.options.write_failure_policy else {
            error!(?path, records = records.len(), error = %err, "write failed, discarding records");
            self.metrics.records_discarded(records.len());
            return;
        };

        let failures = self.write_failures.entry(key.clone()).or_default();
        *failures += 1;

        if *failures < max_attempts {
            warn!(
                ?path,
                records = records.len(),
                attempt = *failures,
                max_attempts,
                error = %err,
                "write failed, records kept for the next cycle"
            );
            self.buffers.reinsert(key, records);
        } else {
            error!(
                ?path,
                records = records.len(),
                attempts = *failures,
                error = %err,
                "write failed too many times, discarding records"
            );
            self.write_failures.remove(&key);
            self.metrics.records_discarded(records.len());
        }
    }

    /// Writes every buffered key unconditionally.
    ///
    /// Each write is retried `drain_retries` times. The buffer table is empty
    /// when this returns.
    pub async fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();

        for key in self.buffers.iter_keys() {
            let Some(records) = self.buffers.snapshot_and_clear(&key) else {
                continue;
            };

            let attempts = self.options.drain_retries.saturating_add(1);
            for attempt in 1..=attempts {
                match self.sink.write_part(&key, &records).await {
                    Ok(part) => {
                        info!(path = %part.path, records = part.num_records, size = %part.size, "wrote part");
                        self.metrics.part_written(&part);
                        report.parts_written += 1;
                        report.records_written += part.num_records;
                        break;
                    }
                    Err(err) => {
                        self.metrics.write_failed();
                        let path = err.path().map(ToString::to_string);

                        if attempt < attempts {
                            warn!(?path, attempt, error = %err, "drain write failed, retrying");
                            tokio::time::sleep(self.options.drain_backoff).await;
                        } else {
                            error!(
                                ?path,
                                records = records.len(),
                                attempts,
                                error = %err,
                                "drain write failed, discarding records"
                            );
                            self.metrics.records_discarded(records.len());
                            report.parts_failed += 1;
                            report.records_discarded += records.len();
                        }
                    }
                }
            }
        }

        self.write_failures.clear();
        report
    }
}
