//! Failure causes attached to part and upload outcomes.
//!
//! Causes serialize as `{"name": …, "message": …}` objects, with structured
//! fields (receipt, HTTP status, counts) alongside when available, so log
//! consumers can triage without parsing messages.

use crate::receipt::Receipt;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Why a single part failed to migrate.
#[derive(Clone, Debug, Error)]
pub enum PartFailureCause {
    /// The caller's cancellation token fired before the part reached a
    /// terminal state.
    #[error("migration was cancelled")]
    Cancelled,

    /// The part fetcher returned a non-2xx response, an unusable
    /// `content-length`, or failed outright.
    #[error("failed to fetch part bytes: {0}")]
    BadFetch(String),

    /// The register-part invocation failed: error receipt or transport.
    #[error("register-part invocation failed: {message}")]
    Register {
        message: String,
        receipt: Option<Box<Receipt>>,
    },

    /// The byte pass-through to the destination-chosen URL failed.
    #[error("{message}")]
    Copy {
        message: String,
        status: Option<u16>,
    },

    /// The register-part receipt was ok but structurally unusable.
    #[error("unexpected register-part receipt: {0}")]
    Protocol(String),
}

impl PartFailureCause {
    /// Stable name used in serialized outcome lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cancelled => "Cancelled",
            Self::BadFetch(_) => "BadFetch",
            Self::Register { .. } => "Register",
            Self::Copy { .. } => "Copy",
            Self::Protocol(_) => "Protocol",
        }
    }

    /// Build a `Copy` cause for a rejected transfer.
    pub fn copy_rejected(status: u16) -> Self {
        Self::Copy {
            message: format!("part copy was rejected with HTTP status {status}"),
            status: Some(status),
        }
    }

    /// Build a `Copy` cause for a transfer that failed before any response.
    pub fn copy_failed(message: impl Into<String>) -> Self {
        Self::Copy {
            message: message.into(),
            status: None,
        }
    }
}

impl Serialize for PartFailureCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", self.name())?;
        map.serialize_entry("message", &self.to_string())?;
        match self {
            Self::Register {
                receipt: Some(receipt),
                ..
            } => map.serialize_entry("receipt", receipt)?,
            Self::Copy {
                status: Some(status),
                ..
            } => map.serialize_entry("status", status)?,
            _ => {}
        }
        map.end()
    }
}

/// Why a whole upload failed to migrate.
#[derive(Clone, Debug, Error)]
pub enum UploadFailureCause {
    /// One or more parts failed; the upload was never bound.
    #[error("{failed} of {total} parts failed to migrate")]
    SomePartsFailed { failed: usize, total: usize },

    /// Every part registered but the register-upload invocation failed.
    #[error("register-upload invocation failed: {message}")]
    Bind {
        message: String,
        receipt: Option<Box<Receipt>>,
    },
}

impl UploadFailureCause {
    /// Stable name used in serialized outcome lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SomePartsFailed { .. } => "SomePartsFailed",
            Self::Bind { .. } => "Bind",
        }
    }
}

impl Serialize for UploadFailureCause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", self.name())?;
        map.serialize_entry("message", &self.to_string())?;
        match self {
            Self::SomePartsFailed { failed, total } => {
                map.serialize_entry("failed", failed)?;
                map.serialize_entry("total", total)?;
            }
            Self::Bind {
                receipt: Some(receipt),
                ..
            } => map.serialize_entry("receipt", receipt)?,
            Self::Bind { receipt: None, .. } => {}
        }
        map.end()
    }
}
