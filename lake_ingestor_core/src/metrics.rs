use lake_observability::{Counter, KeyValue};

use crate::{envelope::DropReason, uploader::WrittenPart};

/// Running totals of one ingestor, also exported as OpenTelemetry counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestorStats {
    pub messages_received: u64,
    pub malformed_json: u64,
    pub missing_headers: u64,
    pub internal_errors: u64,
    pub records_written: u64,
    pub bytes_written: u64,
    pub objects_written: u64,
    pub writes_failed: u64,
    pub records_discarded: u64,
    pub flush_cycles: u64,
}

pub struct IngestionMetrics {
    messages_received: Counter<u64>,
    messages_dropped: Counter<u64>,
    records_written: Counter<u64>,
    bytes_written: Counter<u64>,
    objects_written: Counter<u64>,
    writes_failed: Counter<u64>,
    flush_cycles: Counter<u64>,
    stats: IngestorStats,
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        let meter = lake_observability::meter("ingestor");
        Self {
            messages_received: meter
                .u64_counter("ingestor.messages.received")
                .with_unit("{message}")
                .with_description("messages polled from the broker")
                .build(),
            messages_dropped: meter
                .u64_counter("ingestor.messages.dropped")
                .with_unit("{message}")
                .with_description("messages rejected by the envelope check")
                .build(),
            records_written: meter
                .u64_counter("ingestor.records.written")
                .with_unit("{record}")
                .with_description("records written to the lake")
                .build(),
            bytes_written: meter
                .u64_counter("ingestor.bytes.written")
                .with_unit("By")
                .with_description("parquet bytes written to the lake")
                .build(),
            objects_written: meter
                .u64_counter("ingestor.objects.written")
                .with_unit("{object}")
                .with_description("parquet objects written to the lake")
                .build(),
            writes_failed: meter
                .u64_counter("ingestor.writes.failed")
                .with_unit("{write}")
                .with_description("failed part writes")
                .build(),
            flush_cycles: meter
                .u64_counter("ingestor.flush.cycles")
                .with_unit("{cycle}")
                .with_description("completed flush cycles")
                .build(),
            stats: IngestorStats::default(),
        }
    }
}

impl IngestionMetrics {
    pub fn stats(&self) -> &IngestorStats {
        &self.stats
    }

    pub fn message_received(&mut self) {
        self.messages_received.add(1, &[]);
        self.stats.messages_received += 1;
    }

    pub fn message_dropped(&mut self, reason: DropReason) {
        self.messages_dropped
            .add(1, &[KeyValue::new("reason", reason.as_str())]);

        match reason {
            DropReason::MalformedJson => self.stats.malformed_json += 1,
            DropReason::MissingHeaders => self.stats.missing_headers += 1,
            DropReason::InternalError => self.stats.internal_errors += 1,
        }
    }

    pub fn part_written(&mut self, part: &WrittenPart) {
        let num_records = part.num_records as u64;
        let size = part.size.as_u64();

        self.records_written.add(num_records, &[]);
        self.bytes_written.add(size, &[]);
        self.objects_written.add(1, &[]);

        self.stats.records_written += num_records;
        self.stats.bytes_written += size;
        self.stats.objects_written += 1;
    }

    pub fn write_failed(&mut self) {
        self.writes_failed.add(1, &[]);
        self.stats.writes_failed += 1;
    }

    pub fn records_discarded(&mut self, num_records: usize) {
        self.stats.records_discarded += num_records as u64;
    }

    pub fn flush_cycle(&mut self) {
        self.flush_cycles.add(1, &[]);
        self.stats.flush_cycles += 1;
    }
}

impl IngestorStats {
    pub fn dropped(&self) -> u64 {
        self.malformed_json + self.missing_headers + self.internal_errors
    }
}
