//! Upload binding: the final register-upload invocation.

use crate::assemble::UploadPartsReady;
use crate::traits::DestinationClient;
use caravel_core::cause::UploadFailureCause;
use caravel_core::cid::PartCid;
use caravel_core::outcome::{
    MigrationOutcome, PartOutcome, PartSuccess, RegisterRecord, UploadFailure, UploadSuccess,
};
use caravel_core::receipt::Receipt;
use caravel_core::upload::Upload;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bind each fully-registered upload to its parts and emit the terminal
/// outcome.
pub(crate) async fn run(
    destination: Arc<dyn DestinationClient>,
    mut ready_rx: mpsc::Receiver<UploadPartsReady>,
    outcomes_tx: mpsc::Sender<MigrationOutcome>,
    cancel: CancellationToken,
) {
    while let Some(ready) = ready_rx.recv().await {
        let outcome = bind_upload(destination.as_ref(), ready, &cancel).await;
        if outcomes_tx.send(outcome).await.is_err() {
            return;
        }
    }
}

async fn bind_upload(
    destination: &dyn DestinationClient,
    ready: UploadPartsReady,
    cancel: &CancellationToken,
) -> MigrationOutcome {
    let UploadPartsReady { upload, parts } = ready;

    // The shard list preserves the source part order, duplicates included;
    // only the completion check deduplicated.
    let invocation = destination.register_upload(&upload.cid, &upload.parts);
    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        receipt = invocation => Some(receipt),
    };

    let upload = Upload::clone(&upload);
    match result {
        Some(Ok(receipt)) if receipt.is_ok() => {
            tracing::debug!(upload = %upload.cid, shards = upload.parts.len(), "upload bound");
            MigrationOutcome::Success(UploadSuccess {
                upload,
                parts,
                add: RegisterRecord { receipt },
            })
        }
        Some(Ok(receipt)) => {
            let message = receipt
                .error_message()
                .unwrap_or_else(|| "destination returned an error receipt".to_string());
            failure(upload, parts, message, Some(receipt))
        }
        Some(Err(e)) => failure(upload, parts, e.to_string(), None),
        None => failure(
            upload,
            parts,
            "register-upload was cancelled".to_string(),
            None,
        ),
    }
}

fn failure(
    upload: Upload,
    parts: BTreeMap<PartCid, PartSuccess>,
    message: String,
    receipt: Option<Receipt>,
) -> MigrationOutcome {
    tracing::warn!(upload = %upload.cid, %message, "upload binding failed");
    MigrationOutcome::Failure(UploadFailure {
        upload,
        parts: parts
            .into_iter()
            .map(|(cid, success)| (cid, PartOutcome::Success(success)))
            .collect(),
        cause: UploadFailureCause::Bind {
            message,
            receipt: receipt.map(Box::new),
        },
    })
}
