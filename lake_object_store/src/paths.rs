use std::fmt;

use object_store::path::Path;

/// Root directory of the raw landing layer.
pub const BRONZE_PREFIX: &str = "bronze";

/// Location of an object: the bucket plus the key inside it.
///
/// The object store client is already scoped to the bucket, so only `key`
/// is sent to it. `Display` renders the full `{bucket}/{key}` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LakePath {
    pub bucket: String,
    pub key: Path,
}

impl LakePath {
    pub fn new(bucket: impl Into<String>, key: impl Into<Path>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for LakePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Formats the hive-style directory of a partition:
/// `bronze/topic={T}/tenant_id={N}/project_tag={P}/ds={D}`.
pub fn format_bronze_partition_prefix(topic: &str, tenant: &str, project: &str, ds: &str) -> String {
    format!(
        "{}/topic={}/tenant_id={}/project_tag={}/ds={}",
        BRONZE_PREFIX, topic, tenant, project, ds
    )
}

pub fn format_part_file_name(part_id: &str) -> String {
    format!("part-{}.parquet", part_id)
}

pub fn format_bronze_part_path(
    topic: &str,
    tenant: &str,
    project: &str,
    ds: &str,
    part_id: &str,
) -> String {
    format!(
        "{}/{}",
        format_bronze_partition_prefix(topic, tenant, project, ds),
        format_part_file_name(part_id)
    )
}
