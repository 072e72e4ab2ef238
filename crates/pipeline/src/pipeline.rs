//! Pipeline wiring and the merged outcome stream.
//!
//! Four stage tasks connected by capacity-1 channels:
//!
//! ```text
//! source ─▶ fan-out ─▶ part migrator (k) ─▶ assembler ─▶ binder ─▶ outcomes
//!                                               └───── failures ──────┘
//! ```
//!
//! Backpressure propagates right to left because every stage blocks on its
//! downstream send. The assembler's failure side-channel and the binder's
//! output share the outcome channel, which is the whole of the merger:
//! outcomes appear in arrival order, with no global ordering promise.

use crate::config::MigrationConfig;
use crate::traits::{DestinationClient, PartCopier, PartFetcher, UploadStream};
use crate::{assemble, bind, fanout};
use caravel_core::outcome::MigrationOutcome;
use futures::Stream;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared collaborator handles for one migration run.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn PartFetcher>,
    pub destination: Arc<dyn DestinationClient>,
    pub copier: Arc<dyn PartCopier>,
}

/// Errors surfaced by the pipeline itself rather than by an outcome.
///
/// Per-part and per-upload failures never take this path; they are ordinary
/// outcome values. Only a stage dying unexpectedly does.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline stage {0} panicked")]
    StagePanic(&'static str),
}

/// Run a migration over `source`, yielding one outcome per consumed upload.
///
/// Outcomes arrive in completion order, not source order. The stream ends
/// when the source is exhausted or, after `cancel` fires, once every
/// in-flight part has resolved; cancellation itself is not an error. A stage
/// panic cancels the run and surfaces as a single final `Err` item.
pub fn migrate(
    source: UploadStream,
    collaborators: Collaborators,
    config: MigrationConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<MigrationOutcome, PipelineError>> + Send {
    let (parts_tx, parts_rx) = mpsc::channel(1);
    let (results_tx, results_rx) = mpsc::channel(1);
    let (ready_tx, ready_rx) = mpsc::channel(1);
    let (outcomes_tx, mut outcomes_rx) = mpsc::channel(1);

    let stages: [(&'static str, JoinHandle<()>); 4] = [
        (
            "fan-out",
            tokio::spawn(fanout::run(source, parts_tx, cancel.clone())),
        ),
        (
            "part-migrator",
            tokio::spawn(crate::migrate::run(
                collaborators.clone(),
                config,
                parts_rx,
                results_tx,
                cancel.clone(),
            )),
        ),
        (
            "assembler",
            tokio::spawn(assemble::run(results_rx, ready_tx, outcomes_tx.clone())),
        ),
        (
            "binder",
            tokio::spawn(bind::run(
                collaborators.destination.clone(),
                ready_rx,
                outcomes_tx,
                cancel.clone(),
            )),
        ),
    ];

    async_stream::stream! {
        while let Some(outcome) = outcomes_rx.recv().await {
            yield Ok(outcome);
        }

        // All outcome senders dropped; the stages are done or dead.
        for (name, handle) in stages {
            let joined = handle.await;
            if let Err(e) = joined
                && e.is_panic()
            {
                tracing::error!(stage = name, "pipeline stage panicked");
                cancel.cancel();
                yield Err(PipelineError::StagePanic(name));
                return;
            }
        }
    }
}
