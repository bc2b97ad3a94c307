//! Envelope parsing.
//!
//! A broker message value is a JSON object with a `headers` mapping and an
//! opaque `payload`. Only a handful of header fields are typed; the rest of the
//! envelope is kept verbatim in the record's `_raw` column.
use std::str::Utf8Error;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::{
    key::{PartitionKey, partition_key_at},
    record::Record,
    source::BrokerMessage,
};

/// Why a message was not buffered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DropReason {
    MalformedJson,
    MissingHeaders,
    InternalError,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EnvelopeError {
    #[snafu(display("message has no value"))]
    EmptyPayload,
    #[snafu(display("message value is not valid UTF-8"))]
    InvalidUtf8 { source: Utf8Error },
    #[snafu(display("message value is not valid JSON"))]
    InvalidJson { source: serde_json::Error },
    #[snafu(display("envelope is not a JSON object"))]
    NotAnObject,
    #[snafu(display("envelope has no headers object"))]
    MissingHeaders,
    #[snafu(display("invalid broker coordinates partition={partition} offset={offset}"))]
    InvalidCoordinates { partition: i32, offset: i64 },
}

/// The typed portion of the envelope headers.
///
/// A field that is missing or not a string is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    pub tenant_id: Option<String>,
    pub project_tag: Option<String>,
    pub occurred_at: Option<String>,
    pub agent_run_id: Option<String>,
}

/// A message that passed the envelope check.
#[derive(Debug, Clone)]
pub struct Accepted {
    pub key: PartitionKey,
    pub record: Record,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MalformedJson => "malformed_json",
            DropReason::MissingHeaders => "missing_headers",
            DropReason::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EnvelopeError {
    pub fn reason(&self) -> DropReason {
        match self {
            Self::EmptyPayload | Self::InvalidUtf8 { .. } | Self::InvalidJson { .. } => {
                DropReason::MalformedJson
            }
            Self::NotAnObject | Self::MissingHeaders => DropReason::MissingHeaders,
            Self::InvalidCoordinates { .. } => DropReason::InternalError,
        }
    }
}

impl Headers {
    fn from_map(headers: &Map<String, Value>) -> Self {
        let field = |name: &str| headers.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            tenant_id: field("tenant_id"),
            project_tag: field("project_tag"),
            occurred_at: field("occurred_at"),
            agent_run_id: field("agent_run_id"),
        }
    }
}

/// Parses a broker message into a record and its partition key.
///
/// `now` is both the `ingested_at` timestamp and the fallback date for keying.
pub fn parse_message(
    message: &BrokerMessage,
    now: DateTime<Utc>,
) -> Result<Accepted, EnvelopeError> {
    if message.partition < 0 || message.offset < 0 {
        return InvalidCoordinatesSnafu {
            partition: message.partition,
            offset: message.offset,
        }
        .fail();
    }

    let Some(payload) = message.payload.as_ref() else {
        return EmptyPayloadSnafu {}.fail();
    };

    let raw = std::str::from_utf8(payload).context(InvalidUtf8Snafu {})?;
    let envelope: Value = serde_json::from_str(raw).context(InvalidJsonSnafu {})?;

    let Value::Object(envelope) = envelope else {
        return NotAnObjectSnafu {}.fail();
    };

    let Some(Value::Object(headers)) = envelope.get("headers") else {
        return MissingHeadersSnafu {}.fail();
    };

    let headers = Headers::from_map(headers);

    // A non-string id keeps its JSON text.
    let event_id = match envelope.get("event_id") {
        None | Some(Value::Null) => headers.agent_run_id.clone(),
        Some(Value::String(id)) => Some(id.clone()),
        Some(other) => Some(other.to_string()),
    };

    let key = partition_key_at(&headers, &message.topic, now);

    let record = Record {
        raw: raw.to_string(),
        event_id,
        topic: message.topic.clone(),
        partition: message.partition,
        offset: message.offset,
        ingested_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    Ok(Accepted { key, record })
}
