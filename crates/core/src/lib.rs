//! Core domain types for migrating content-addressed uploads into a
//! capability-based store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload and part content identifiers
//! - Source upload descriptors with opaque pass-through fields
//! - Invocation receipts and the decoded part-registration payload
//! - The exhaustive failure-cause taxonomy
//! - Per-part and per-upload outcomes and their NDJSON wire format
//! - Capability proofs forwarded to the destination

pub mod auth;
pub mod cause;
pub mod cid;
pub mod error;
pub mod outcome;
pub mod receipt;
pub mod upload;

pub use auth::Authorization;
pub use cause::{PartFailureCause, UploadFailureCause};
pub use cid::{PartCid, UploadCid};
pub use error::{Error, Result};
pub use outcome::{
    CopyRecord, MigrationOutcome, PartFailure, PartOutcome, PartSuccess, RegisterRecord,
    UploadFailure, UploadRef, UploadSuccess,
};
pub use receipt::{PartRegistration, Receipt, ReceiptOut, STATUS_DONE, STATUS_UPLOAD};
pub use upload::Upload;
