use std::sync::{Arc, LazyLock};

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

/// The flat row written to Parquet for every accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The envelope as JSON text, exactly as it was delivered.
    pub raw: String,
    pub event_id: Option<String>,
    /// The broker topic, before sanitization.
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// RFC-3339 UTC timestamp assigned when the record was buffered.
    pub ingested_at: String,
}

static RECORD_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("_raw", DataType::Utf8, false),
        Field::new("event_id", DataType::Utf8, true),
        Field::new("topic", DataType::Utf8, false),
        Field::new("partition", DataType::Int32, false),
        Field::new("offset", DataType::Int64, false),
        Field::new("ingested_at", DataType::Utf8, false),
    ]))
});

/// The Arrow schema of [`Record`].
pub fn record_schema() -> SchemaRef {
    RECORD_SCHEMA.clone()
}
