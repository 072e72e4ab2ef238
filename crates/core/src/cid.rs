//! Content identifier newtypes.
//!
//! CIDs are opaque strings minted by the legacy service; the migration never
//! inspects their structure, only compares them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root content identifier naming a logical upload.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadCid(String);

impl UploadCid {
    /// Parse from a string, rejecting empty input.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidCid("empty upload CID".to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UploadCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadCid({})", self.0)
    }
}

impl fmt::Display for UploadCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content identifier of one archive part (shard) of an upload.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartCid(String);

impl PartCid {
    /// Parse from a string, rejecting empty input.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidCid("empty part CID".to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PartCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartCid({})", self.0)
    }
}

impl fmt::Display for PartCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
