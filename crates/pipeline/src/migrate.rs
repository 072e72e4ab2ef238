//! Per-part migration: fetch, register, and conditional byte pass-through.

use crate::config::MigrationConfig;
use crate::fanout::FetchablePart;
use crate::pipeline::Collaborators;
use crate::traits::{CopyError, FetchError, InvokeError};
use caravel_core::cause::PartFailureCause;
use caravel_core::outcome::{CopyRecord, PartFailure, PartOutcome, PartSuccess, RegisterRecord, UploadRef};
use caravel_core::receipt::{STATUS_DONE, STATUS_UPLOAD};
use caravel_core::upload::Upload;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A part that reached a terminal state, tagged with its owning upload.
#[derive(Clone, Debug)]
pub(crate) struct MigratedPart {
    pub upload: Arc<Upload>,
    pub outcome: PartOutcome,
}

/// Convert fetchable parts into terminal part outcomes with up to
/// `config.worker_count()` migrations in flight.
///
/// The stage pulls from upstream only while fewer than the worker count are
/// in flight, so at most one item of look-ahead is held beyond the active
/// set. Completion order is arbitrary; the assembler tolerates it.
pub(crate) async fn run(
    collaborators: Collaborators,
    config: MigrationConfig,
    mut parts_rx: mpsc::Receiver<FetchablePart>,
    results_tx: mpsc::Sender<MigratedPart>,
    cancel: CancellationToken,
) {
    let workers = config.worker_count();
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            Some(done) = in_flight.next(), if !in_flight.is_empty() => {
                if results_tx.send(done).await.is_err() {
                    return;
                }
            }
            next = parts_rx.recv(), if in_flight.len() < workers => {
                match next {
                    Some(item) => in_flight.push(migrate_part(
                        collaborators.clone(),
                        config.clone(),
                        item,
                        cancel.clone(),
                    )),
                    None => break,
                }
            }
        }
    }

    // Upstream closed; drain what is still flying.
    while let Some(done) = in_flight.next().await {
        if results_tx.send(done).await.is_err() {
            return;
        }
    }
}

async fn migrate_part(
    collaborators: Collaborators,
    config: MigrationConfig,
    item: FetchablePart,
    cancel: CancellationToken,
) -> MigratedPart {
    let outcome = match try_migrate_part(&collaborators, &config, &item, &cancel).await {
        Ok(success) => PartOutcome::Success(success),
        Err(cause) => {
            tracing::warn!(
                upload = %item.upload.cid,
                part = %item.part,
                cause = %cause,
                "part migration failed"
            );
            PartOutcome::Failure(PartFailure {
                part: item.part.clone(),
                upload: UploadRef {
                    cid: item.upload.cid.clone(),
                },
                cause,
            })
        }
    };
    MigratedPart {
        upload: item.upload,
        outcome,
    }
}

/// One part, start to finish. Every failure maps to a typed cause; nothing
/// escapes to the stage loop.
async fn try_migrate_part(
    collaborators: &Collaborators,
    config: &MigrationConfig,
    item: &FetchablePart,
    cancel: &CancellationToken,
) -> Result<PartSuccess, PartFailureCause> {
    if cancel.is_cancelled() {
        return Err(PartFailureCause::Cancelled);
    }

    let fetched = collaborators
        .fetcher
        .fetch(&item.part, cancel)
        .await
        .map_err(|e| match e {
            FetchError::Cancelled => PartFailureCause::Cancelled,
            FetchError::Transport(message) => PartFailureCause::BadFetch(message),
        })?;
    if !(200..300).contains(&fetched.status) {
        return Err(PartFailureCause::BadFetch(format!(
            "fetch returned HTTP {}",
            fetched.status
        )));
    }
    let size = match fetched.content_length() {
        Some(0) => return Err(PartFailureCause::BadFetch("content-length is zero".into())),
        Some(size) => size,
        None => {
            return Err(PartFailureCause::BadFetch(
                "missing or invalid content-length".into(),
            ));
        }
    };

    let receipt = with_cancel(cancel, collaborators.destination.register_part(&item.part, size))
        .await
        .ok_or(PartFailureCause::Cancelled)?
        .map_err(|e| match e {
            InvokeError::Cancelled => PartFailureCause::Cancelled,
            InvokeError::Transport(message) => PartFailureCause::Register {
                message,
                receipt: None,
            },
        })?;
    if !receipt.is_ok() {
        let message = receipt
            .error_message()
            .unwrap_or_else(|| "destination returned an error receipt".to_string());
        return Err(PartFailureCause::Register {
            message,
            receipt: Some(Box::new(receipt)),
        });
    }

    let registration = receipt
        .part_registration()
        .map_err(|e| PartFailureCause::Protocol(e.to_string()))?;
    if let Some(expected) = &config.expected_register_status
        && registration.status != *expected
    {
        return Err(PartFailureCause::Protocol(format!(
            "register-part status {:?} where {expected:?} was expected",
            registration.status
        )));
    }

    let copy = match registration.status.as_str() {
        STATUS_DONE => {
            // Destination already holds the bytes; release the body unread.
            drop(fetched.body);
            None
        }
        STATUS_UPLOAD => {
            let url = registration.url.as_deref().ok_or_else(|| {
                PartFailureCause::Protocol("upload demanded without a target url".into())
            })?;
            let headers = registration.headers.clone().unwrap_or_default();
            let status = with_cancel(
                cancel,
                collaborators.copier.copy(url, &headers, size, fetched.body),
            )
            .await
            .ok_or(PartFailureCause::Cancelled)?
            .map_err(|e| match e {
                CopyError::Cancelled => PartFailureCause::Cancelled,
                CopyError::Transport(message) => PartFailureCause::copy_failed(message),
            })?;
            if !(200..300).contains(&status) {
                return Err(PartFailureCause::copy_rejected(status));
            }
            Some(CopyRecord { status })
        }
        other => {
            return Err(PartFailureCause::Protocol(format!(
                "register-part status {other:?} is neither done nor upload"
            )));
        }
    };

    Ok(PartSuccess {
        part: item.part.clone(),
        add: RegisterRecord { receipt },
        copy,
        upload: UploadRef {
            cid: item.upload.cid.clone(),
        },
    })
}

/// Race `future` against the cancellation token; `None` means cancelled.
/// Dropping the losing future aborts any in-flight HTTP call it holds.
async fn with_cancel<T>(cancel: &CancellationToken, future: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = future => Some(out),
    }
}
