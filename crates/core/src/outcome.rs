//! Per-part and per-upload migration outcomes and their log wire format.
//!
//! One `MigrationOutcome` is emitted per input upload and serializes to one
//! newline-delimited JSON log line, discriminated by a `type` field.

use crate::cause::{PartFailureCause, UploadFailureCause};
use crate::cid::{PartCid, UploadCid};
use crate::receipt::Receipt;
use crate::upload::Upload;
use serde::Serialize;
use std::collections::BTreeMap;

/// Reference back to the owning upload, embedded in part records.
#[derive(Clone, Debug, Serialize)]
pub struct UploadRef {
    pub cid: UploadCid,
}

/// A registration receipt wrapper, keyed `add` on the wire.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterRecord {
    pub receipt: Receipt,
}

/// Result of a demanded byte transfer.
#[derive(Clone, Debug, Serialize)]
pub struct CopyRecord {
    pub status: u16,
}

/// A part that registered (and, when demanded, copied) successfully.
#[derive(Clone, Debug, Serialize)]
pub struct PartSuccess {
    pub part: PartCid,
    pub add: RegisterRecord,
    /// `null` when the destination already held the bytes.
    pub copy: Option<CopyRecord>,
    pub upload: UploadRef,
}

/// A part whose migration failed; isolated to its upload.
#[derive(Clone, Debug, Serialize)]
pub struct PartFailure {
    pub part: PartCid,
    pub upload: UploadRef,
    pub cause: PartFailureCause,
}

/// Terminal state of one part.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum PartOutcome {
    Success(PartSuccess),
    Failure(PartFailure),
}

impl PartOutcome {
    /// The part this outcome is for.
    pub fn part(&self) -> &PartCid {
        match self {
            Self::Success(s) => &s.part,
            Self::Failure(f) => &f.part,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// An upload whose every part registered and whose binding succeeded.
#[derive(Clone, Debug, Serialize)]
pub struct UploadSuccess {
    pub upload: Upload,
    /// One entry per distinct part CID.
    pub parts: BTreeMap<PartCid, PartSuccess>,
    pub add: RegisterRecord,
}

/// An upload that failed: some parts failed, or the binding did.
#[derive(Clone, Debug, Serialize)]
pub struct UploadFailure {
    pub upload: Upload,
    /// One entry per distinct part CID that reached a terminal state.
    pub parts: BTreeMap<PartCid, PartOutcome>,
    pub cause: UploadFailureCause,
}

/// One outcome line per input upload.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum MigrationOutcome {
    #[serde(rename = "UploadMigrationSuccess")]
    Success(UploadSuccess),
    #[serde(rename = "UploadMigrationFailure")]
    Failure(UploadFailure),
}

impl MigrationOutcome {
    /// The source upload this outcome answers.
    pub fn upload(&self) -> &Upload {
        match self {
            Self::Success(s) => &s.upload,
            Self::Failure(f) => &f.upload,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
