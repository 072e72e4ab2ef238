//! Collaborator seams consumed by the migration pipeline.
//!
//! The pipeline never talks HTTP itself; it drives these traits and lets the
//! caller inject real clients or test doubles.

use async_trait::async_trait;
use bytes::Bytes;
use caravel_core::cid::{PartCid, UploadCid};
use caravel_core::receipt::Receipt;
use caravel_core::upload::Upload;
use futures::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed error type carried by byte streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed stream of body bytes from the part fetcher.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send + 'static>>;

/// A finite sequence of uploads to migrate.
pub type UploadStream = Pin<Box<dyn Stream<Item = Upload> + Send + 'static>>;

/// Response from fetching one part's bytes.
pub struct FetchedPart {
    /// HTTP status returned by the fetcher.
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Lazily consumed body. Owned by exactly one task from fetch to release;
    /// must be fully read or dropped before the part's processing returns.
    pub body: ByteStream,
}

impl FetchedPart {
    /// Decimal `content-length` header, if present and parsable.
    ///
    /// Only unsigned decimal digits are accepted; anything else (signs,
    /// whitespace, hex) reads as absent.
    pub fn content_length(&self) -> Option<u64> {
        let raw = self.headers.get("content-length")?;
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }
}

/// Errors from the part fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("part fetch was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Fetches part bytes from the legacy service.
#[async_trait]
pub trait PartFetcher: Send + Sync + 'static {
    /// Request the part's archive, returning headers and a streaming body.
    async fn fetch(
        &self,
        part: &PartCid,
        cancel: &CancellationToken,
    ) -> Result<FetchedPart, FetchError>;
}

/// Errors from destination invocations.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("invocation was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Issues signed capability invocations against the destination service.
///
/// Authorization and the destination namespace are fixed at construction;
/// the pipeline never sees either.
#[async_trait]
pub trait DestinationClient: Send + Sync + 'static {
    /// Record one part's CID and size in the destination namespace.
    async fn register_part(&self, part: &PartCid, size: u64) -> Result<Receipt, InvokeError>;

    /// Bind the given parts, in order, to the upload's root CID.
    async fn register_upload(
        &self,
        root: &UploadCid,
        shards: &[PartCid],
    ) -> Result<Receipt, InvokeError>;
}

/// Errors from the byte pass-through.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("part copy was cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Streams fetched part bytes to a destination-chosen URL.
#[async_trait]
pub trait PartCopier: Send + Sync + 'static {
    /// PUT `body` to `url` with `headers`, returning the final HTTP status.
    ///
    /// The body must be forwarded as-is without buffering it whole;
    /// `content_length` is the length the request must advertise.
    async fn copy(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        content_length: u64,
        body: ByteStream,
    ) -> Result<u16, CopyError>;
}
