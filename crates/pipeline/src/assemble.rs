//! Grouping of part outcomes into per-upload results.

use crate::migrate::MigratedPart;
use caravel_core::cause::{PartFailureCause, UploadFailureCause};
use caravel_core::cid::{PartCid, UploadCid};
use caravel_core::outcome::{
    MigrationOutcome, PartFailure, PartOutcome, PartSuccess, UploadFailure, UploadRef,
};
use caravel_core::upload::Upload;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;

/// An upload whose every part registered successfully, ready to bind.
#[derive(Clone, Debug)]
pub(crate) struct UploadPartsReady {
    pub upload: Arc<Upload>,
    pub parts: BTreeMap<PartCid, PartSuccess>,
}

/// In-progress bookkeeping for one upload.
///
/// Held only between the first part outcome arriving and the last one;
/// removed from the map the moment the upload completes.
struct Accumulator {
    upload: Arc<Upload>,
    expected: HashSet<PartCid>,
    received: BTreeMap<PartCid, PartOutcome>,
}

enum Completed {
    Ready(UploadPartsReady),
    Failed(UploadFailure),
}

impl Accumulator {
    fn new(upload: Arc<Upload>) -> Self {
        let expected = upload.parts.iter().cloned().collect();
        Self {
            upload,
            expected,
            received: BTreeMap::new(),
        }
    }

    fn insert(&mut self, outcome: PartOutcome) {
        // Duplicate part CIDs collapse here; last outcome wins.
        self.received.insert(outcome.part().clone(), outcome);
    }

    /// Complete once every distinct expected part has a terminal outcome.
    fn is_complete(&self) -> bool {
        self.expected
            .iter()
            .all(|part| self.received.contains_key(part))
    }

    fn finish(self) -> Completed {
        let failed = self.received.values().filter(|o| !o.is_success()).count();
        if failed == 0 {
            let parts = self
                .received
                .into_iter()
                .map(|(cid, outcome)| match outcome {
                    PartOutcome::Success(success) => (cid, success),
                    PartOutcome::Failure(_) => unreachable!("filtered above"),
                })
                .collect();
            Completed::Ready(UploadPartsReady {
                upload: self.upload,
                parts,
            })
        } else {
            Completed::Failed(UploadFailure {
                upload: Upload::clone(&self.upload),
                parts: self.received,
                cause: UploadFailureCause::SomePartsFailed {
                    failed,
                    total: self.expected.len(),
                },
            })
        }
    }

    /// Force completion by marking every missing part cancelled.
    fn finish_interrupted(mut self) -> UploadFailure {
        for part in &self.expected {
            if !self.received.contains_key(part) {
                self.received.insert(
                    part.clone(),
                    PartOutcome::Failure(PartFailure {
                        part: part.clone(),
                        upload: UploadRef {
                            cid: self.upload.cid.clone(),
                        },
                        cause: PartFailureCause::Cancelled,
                    }),
                );
            }
        }
        match self.finish() {
            Completed::Failed(failure) => failure,
            // An interrupted accumulator is incomplete, so at least one
            // cancelled failure was synthesized above.
            Completed::Ready(_) => unreachable!("interrupted accumulator cannot be all-success"),
        }
    }
}

/// Group part outcomes by upload CID and emit one result per upload, in
/// completion order.
///
/// Fully successful uploads go to the binder; anything else short-circuits
/// straight to the outcome channel.
pub(crate) async fn run(
    mut results_rx: mpsc::Receiver<MigratedPart>,
    ready_tx: mpsc::Sender<UploadPartsReady>,
    outcomes_tx: mpsc::Sender<MigrationOutcome>,
) {
    let mut pending: HashMap<UploadCid, Accumulator> = HashMap::new();

    while let Some(MigratedPart { upload, outcome }) = results_rx.recv().await {
        let cid = upload.cid.clone();
        let accumulator = pending
            .entry(cid.clone())
            .or_insert_with(|| Accumulator::new(upload));
        accumulator.insert(outcome);

        if accumulator.is_complete() {
            let accumulator = pending.remove(&cid).expect("accumulator just inserted");
            match accumulator.finish() {
                Completed::Ready(ready) => {
                    tracing::debug!(upload = %cid, "all parts registered");
                    if ready_tx.send(ready).await.is_err() {
                        return;
                    }
                }
                Completed::Failed(failure) => {
                    if outcomes_tx
                        .send(MigrationOutcome::Failure(failure))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        }
    }

    // Upstream closed mid-upload (cancellation). Every upload that produced
    // at least one part outcome still gets exactly one outcome.
    for (cid, accumulator) in pending.drain() {
        tracing::debug!(upload = %cid, "closing interrupted upload");
        let failure = accumulator.finish_interrupted();
        if outcomes_tx
            .send(MigrationOutcome::Failure(failure))
            .await
            .is_err()
        {
            return;
        }
    }
}
