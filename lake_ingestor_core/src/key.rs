//! Partition keying.
//!
//! Every accepted envelope maps to a [`PartitionKey`] that decides which
//! buffer it joins and, eventually, which directory its Parquet part lands in.
//! Keying never fails: headers of poor quality fall back to sentinel values.
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use lake_object_store::{
    LakePath,
    paths::{format_bronze_part_path, format_bronze_partition_prefix},
};

use crate::envelope::Headers;

/// Tenant used when the envelope has no `tenant_id` header.
pub const UNKNOWN_TENANT: &str = "UNKNOWN";
/// Project used when the envelope has no `project_tag` header.
pub const GLOBAL_PROJECT: &str = "GLOBAL";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The `(topic, tenant, project, date)` tuple that groups records.
///
/// Keys are compared as opaque tuples. Only [`PartitionKey::partition_prefix`]
/// and [`PartitionKey::part_path`] interpret the components as path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub topic: String,
    pub tenant: String,
    pub project: String,
    /// `YYYY-MM-DD` in UTC.
    pub date: String,
}

impl PartitionKey {
    pub fn new(
        topic: impl Into<String>,
        tenant: impl Into<String>,
        project: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            tenant: tenant.into(),
            project: project.into(),
            date: date.into(),
        }
    }

    /// The hive-style directory of this key, relative to the bucket.
    pub fn partition_prefix(&self) -> String {
        format_bronze_partition_prefix(&self.topic, &self.tenant, &self.project, &self.date)
    }

    /// The location of a part with the given id.
    pub fn part_path(&self, bucket: &str, part_id: &str) -> LakePath {
        let key = format_bronze_part_path(
            &self.topic,
            &self.tenant,
            &self.project,
            &self.date,
            part_id,
        );
        LakePath::new(bucket, key)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.topic, self.tenant, self.project, self.date
        )
    }
}

/// Replaces `/` and ` ` with `_`.
pub fn sanitize_topic(topic: &str) -> String {
    topic.replace(['/', ' '], "_")
}

/// Computes the partition key using the current UTC time as fallback date.
pub fn partition_key(headers: &Headers, topic: &str) -> PartitionKey {
    partition_key_at(headers, topic, Utc::now())
}

/// Computes the partition key, using `now` when `occurred_at` is missing or invalid.
pub fn partition_key_at(headers: &Headers, topic: &str, now: DateTime<Utc>) -> PartitionKey {
    let tenant = headers.tenant_id.as_deref().unwrap_or(UNKNOWN_TENANT);
    let project = headers.project_tag.as_deref().unwrap_or(GLOBAL_PROJECT);
    let date = headers
        .occurred_at
        .as_deref()
        .and_then(parse_occurred_date)
        .unwrap_or_else(|| now.date_naive());

    PartitionKey::new(
        sanitize_topic(topic),
        tenant,
        project,
        date.format(DATE_FORMAT).to_string(),
    )
}

/// Parses the UTC date of an `occurred_at` header.
///
/// RFC-3339 is expected. Timestamps without an offset and bare dates are
/// accepted and read as UTC.
fn parse_occurred_date(occurred_at: &str) -> Option<NaiveDate> {
    let occurred_at = occurred_at.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(occurred_at) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }

    if let Ok(ts) = NaiveDateTime::parse_from_str(occurred_at, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ts.date());
    }

    NaiveDate::parse_from_str(occurred_at, DATE_FORMAT).ok()
}
