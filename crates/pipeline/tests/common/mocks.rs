//! Instrumented collaborator doubles for pipeline tests.

// Each test binary uses a different subset of these doubles.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use caravel_core::cid::{PartCid, UploadCid};
use caravel_core::receipt::Receipt;
use caravel_core::upload::Upload;
use caravel_pipeline::traits::{
    ByteStream, CopyError, DestinationClient, FetchError, FetchedPart, InvokeError, PartCopier,
    PartFetcher, UploadStream,
};
use futures::StreamExt;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

pub fn upload_cid(n: usize) -> UploadCid {
    UploadCid::parse(&format!("bafyupload{n:04}")).unwrap()
}

pub fn part_cid(n: usize) -> PartCid {
    PartCid::parse(&format!("bagpart{n:04}")).unwrap()
}

/// `count` uploads with one part each.
pub fn single_part_uploads(count: usize) -> Vec<Upload> {
    (0..count)
        .map(|n| Upload::new(upload_cid(n), vec![part_cid(n)]))
        .collect()
}

/// A source that counts how many uploads the pipeline has pulled.
pub fn counted_source(uploads: Vec<Upload>, pulled: Arc<AtomicUsize>) -> UploadStream {
    Box::pin(async_stream::stream! {
        for upload in uploads {
            pulled.fetch_add(1, Ordering::SeqCst);
            yield upload;
        }
    })
}

/// An unbounded source of single-part uploads, counting pulls.
pub fn endless_source(pulled: Arc<AtomicUsize>) -> UploadStream {
    Box::pin(async_stream::stream! {
        let mut n = 0usize;
        loop {
            pulled.fetch_add(1, Ordering::SeqCst);
            yield Upload::new(upload_cid(n), vec![part_cid(n)]);
            n += 1;
        }
    })
}

/// How the stub fetcher answers one part.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum FetchBehavior {
    /// 200 with a body of `content_length` zero bytes and a matching header.
    Body { content_length: u64 },
    /// The given HTTP status with an empty body and no length header.
    Status(u16),
    /// 200 but no `content-length` header.
    MissingLength,
    /// Sleep `Duration`, then behave like `Body`.
    Delayed(Duration, u64),
    /// Never complete until the cancellation token fires.
    Hang,
    /// Transport-level failure.
    Fail(String),
}

/// Part fetcher double with per-part overrides and concurrency counters.
pub struct StubFetcher {
    default: FetchBehavior,
    overrides: Mutex<HashMap<String, FetchBehavior>>,
    pub started: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl StubFetcher {
    pub fn new(default: FetchBehavior) -> Arc<Self> {
        Arc::new(Self {
            default,
            overrides: Mutex::new(HashMap::new()),
            started: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_override(self: Arc<Self>, part: &PartCid, behavior: FetchBehavior) -> Arc<Self> {
        self.overrides
            .lock()
            .unwrap()
            .insert(part.as_str().to_string(), behavior);
        self
    }

    fn behavior_for(&self, part: &PartCid) -> FetchBehavior {
        self.overrides
            .lock()
            .unwrap()
            .get(part.as_str())
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn enter(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn body_of(content_length: u64) -> FetchedPart {
    let bytes = Bytes::from(vec![0u8; content_length as usize]);
    FetchedPart {
        status: 200,
        headers: BTreeMap::from([("content-length".to_string(), content_length.to_string())]),
        body: Box::pin(futures::stream::iter(vec![Ok(bytes)])),
    }
}

#[async_trait]
impl PartFetcher for StubFetcher {
    async fn fetch(
        &self,
        part: &PartCid,
        cancel: &CancellationToken,
    ) -> Result<FetchedPart, FetchError> {
        self.enter();
        let result = match self.behavior_for(part) {
            FetchBehavior::Body { content_length } => Ok(body_of(content_length)),
            FetchBehavior::Status(status) => Ok(FetchedPart {
                status,
                headers: BTreeMap::new(),
                body: Box::pin(futures::stream::empty()),
            }),
            FetchBehavior::MissingLength => Ok(FetchedPart {
                status: 200,
                headers: BTreeMap::new(),
                body: Box::pin(futures::stream::empty()),
            }),
            FetchBehavior::Delayed(delay, content_length) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(FetchError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(body_of(content_length)),
                }
            }
            FetchBehavior::Hang => {
                cancel.cancelled().await;
                Err(FetchError::Cancelled)
            }
            FetchBehavior::Fail(message) => Err(FetchError::Transport(message)),
        };
        self.leave();
        result
    }
}

/// Destination double with scripted receipt queues and call recording.
///
/// Empty queues fall back to an ok `done` receipt (register-part) or a bare
/// ok receipt (register-upload).
pub struct ScriptedDestination {
    part_results: Mutex<VecDeque<Result<Receipt, InvokeError>>>,
    upload_results: Mutex<VecDeque<Result<Receipt, InvokeError>>>,
    pub part_calls: Mutex<Vec<(String, u64)>>,
    pub upload_calls: Mutex<Vec<(String, Vec<String>)>>,
}

#[allow(dead_code)]
impl ScriptedDestination {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            part_results: Mutex::new(VecDeque::new()),
            upload_results: Mutex::new(VecDeque::new()),
            part_calls: Mutex::new(Vec::new()),
            upload_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn queue_part(&self, result: Result<Receipt, InvokeError>) -> &Self {
        self.part_results.lock().unwrap().push_back(result);
        self
    }

    pub fn queue_upload(&self, result: Result<Receipt, InvokeError>) -> &Self {
        self.upload_results.lock().unwrap().push_back(result);
        self
    }

    pub fn part_call_count(&self) -> usize {
        self.part_calls.lock().unwrap().len()
    }
}

pub fn done_receipt() -> Receipt {
    Receipt::ok(json!({"status": "done"}))
}

pub fn upload_demand_receipt(url: &str) -> Receipt {
    Receipt::ok(json!({
        "status": "upload",
        "url": url,
        "headers": {"content-type": "application/car"}
    }))
}

pub fn error_receipt(message: &str) -> Receipt {
    Receipt::err(json!({"name": "InvocationFailure", "message": message}))
}

#[async_trait]
impl DestinationClient for ScriptedDestination {
    async fn register_part(&self, part: &PartCid, size: u64) -> Result<Receipt, InvokeError> {
        self.part_calls
            .lock()
            .unwrap()
            .push((part.as_str().to_string(), size));
        self.part_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(done_receipt()))
    }

    async fn register_upload(
        &self,
        root: &UploadCid,
        shards: &[PartCid],
    ) -> Result<Receipt, InvokeError> {
        self.upload_calls.lock().unwrap().push((
            root.as_str().to_string(),
            shards.iter().map(|p| p.as_str().to_string()).collect(),
        ));
        self.upload_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Receipt::ok(json!({}))))
    }
}

/// One recorded byte pass-through.
#[derive(Clone, Debug)]
pub struct CopyCall {
    pub url: String,
    pub content_length: u64,
    pub body_len: u64,
}

/// Copier double that drains the body and answers a fixed status.
pub struct RecordingCopier {
    status: u16,
    pub calls: Mutex<Vec<CopyCall>>,
}

#[allow(dead_code)]
impl RecordingCopier {
    pub fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PartCopier for RecordingCopier {
    async fn copy(
        &self,
        url: &str,
        _headers: &BTreeMap<String, String>,
        content_length: u64,
        mut body: ByteStream,
    ) -> Result<u16, CopyError> {
        let mut body_len = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| CopyError::Transport(e.to_string()))?;
            body_len += chunk.len() as u64;
        }
        self.calls.lock().unwrap().push(CopyCall {
            url: url.to_string(),
            content_length,
            body_len,
        });
        Ok(self.status)
    }
}

/// A fetcher whose every call panics, for stage-supervision tests.
pub struct PanickingFetcher;

#[async_trait]
impl PartFetcher for PanickingFetcher {
    async fn fetch(
        &self,
        _part: &PartCid,
        _cancel: &CancellationToken,
    ) -> Result<FetchedPart, FetchError> {
        panic!("fetcher exploded");
    }
}
