//! Source upload descriptors.

use crate::cid::{PartCid, UploadCid};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// A logical content-addressed object to migrate, as listed by the legacy
/// service.
///
/// Only `cid` and `parts` drive the migration. Everything else is carried
/// through untouched so outcome log lines reproduce the source record and
/// failure lines can seed a re-run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    /// Legacy service record id.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Root CID naming the upload.
    pub cid: UploadCid,
    /// Name given at upload time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Part (shard) CIDs in service order. May contain duplicates.
    #[serde(default)]
    pub parts: Vec<PartCid>,
    /// Creation timestamp, verbatim from the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Last-update timestamp, verbatim from the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Total DAG size reported by the legacy service.
    #[serde(rename = "dagSize", default, skip_serializing_if = "Option::is_none")]
    pub dag_size: Option<u64>,
    /// Any remaining source fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Upload {
    /// Create a bare descriptor with just the fields the pipeline needs.
    pub fn new(cid: UploadCid, parts: Vec<PartCid>) -> Self {
        Self {
            source_id: None,
            cid,
            name: None,
            parts,
            created: None,
            updated: None,
            dag_size: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The distinct part set, used for completion checks.
    ///
    /// The ordered (possibly duplicated) `parts` list is still what gets
    /// bound at upload registration time.
    pub fn distinct_parts(&self) -> HashSet<&PartCid> {
        self.parts.iter().collect()
    }
}
