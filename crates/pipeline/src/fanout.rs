//! Fan-out of upload descriptors into per-part work items.

use crate::traits::UploadStream;
use caravel_core::cid::PartCid;
use caravel_core::upload::Upload;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One part of one upload, ready to fetch.
#[derive(Clone, Debug)]
pub(crate) struct FetchablePart {
    pub upload: Arc<Upload>,
    pub part: PartCid,
}

/// Emit every distinct part of every source upload, strictly in source
/// order.
///
/// A part CID repeated within one upload is emitted once; migrating it twice
/// would race the assembler's set-based completion check and move the same
/// bytes twice. The ordered (possibly duplicated) list still reaches the
/// binder untouched via the upload descriptor.
///
/// The next upload is not pulled until all of the current upload's parts have
/// been handed downstream, which keeps the assembler's working set bounded by
/// the number of uploads actually in flight.
///
/// On cancellation the current upload's remaining parts are still emitted
/// (they resolve as cancelled part failures downstream, so the upload gets
/// its one outcome) and no further uploads are pulled.
pub(crate) async fn run(
    mut source: UploadStream,
    parts_tx: mpsc::Sender<FetchablePart>,
    cancel: CancellationToken,
) {
    loop {
        let upload = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next() => match next {
                Some(upload) => upload,
                None => break,
            },
        };

        let upload = Arc::new(upload);
        tracing::debug!(upload = %upload.cid, parts = upload.parts.len(), "fanning out upload");
        let mut seen: HashSet<PartCid> = HashSet::new();
        for part in upload.parts.clone() {
            if !seen.insert(part.clone()) {
                continue;
            }
            let item = FetchablePart {
                upload: Arc::clone(&upload),
                part,
            };
            if parts_tx.send(item).await.is_err() {
                // Downstream is gone; nothing left to feed.
                return;
            }
        }
    }
}
