//! Signed receipts returned by the destination service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Registration status meaning the destination already holds the part.
pub const STATUS_DONE: &str = "done";

/// Registration status meaning the destination wants the part bytes.
pub const STATUS_UPLOAD: &str = "upload";

/// A signed record attesting to the outcome of one capability invocation.
///
/// Everything except the ok/err discriminant is opaque to the migration and
/// is carried through into outcome logs for auditability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "type", default = "receipt_type")]
    pub kind: String,
    /// The invocation this receipt answers, as encoded by the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ran: Option<Value>,
    /// Result payload.
    pub out: ReceiptOut,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,
    /// Effects attached by the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

fn receipt_type() -> String {
    "Receipt".to_string()
}

/// The ok/err result of an invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Receipt {
    /// Build a bare ok receipt carrying `payload`.
    pub fn ok(payload: Value) -> Self {
        Self {
            kind: receipt_type(),
            ran: None,
            out: ReceiptOut {
                ok: Some(payload),
                error: None,
            },
            issuer: None,
            signature: None,
            fx: None,
            meta: None,
        }
    }

    /// Build a bare error receipt carrying `payload`.
    pub fn err(payload: Value) -> Self {
        Self {
            kind: receipt_type(),
            ran: None,
            out: ReceiptOut {
                ok: None,
                error: Some(payload),
            },
            issuer: None,
            signature: None,
            fx: None,
            meta: None,
        }
    }

    /// Whether the invocation succeeded.
    ///
    /// A receipt carrying both `ok` and `error` is treated as failed.
    pub fn is_ok(&self) -> bool {
        self.out.ok.is_some() && self.out.error.is_none()
    }

    /// Best-effort human-readable message from an error receipt.
    pub fn error_message(&self) -> Option<String> {
        let error = self.out.error.as_ref()?;
        if let Some(message) = error.get("message").and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(name) = error.get("name").and_then(Value::as_str) {
            return Some(name.to_string());
        }
        Some(error.to_string())
    }

    /// Decode the ok payload of a register-part receipt.
    pub fn part_registration(&self) -> crate::Result<PartRegistration> {
        let ok = self
            .out
            .ok
            .clone()
            .ok_or_else(|| crate::Error::Receipt("receipt has no ok payload".to_string()))?;
        serde_json::from_value(ok)
            .map_err(|e| crate::Error::Receipt(format!("undecodable register-part payload: {e}")))
    }
}

/// Decoded ok payload of a register-part receipt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PartRegistration {
    /// `done` when the destination already holds the part, `upload` when it
    /// wants the bytes sent to `url`.
    pub status: String,
    /// Presigned target for the byte transfer, present when demanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Headers the byte transfer must carry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// Bytes newly allocated in the destination namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with: Option<String>,
}

impl PartRegistration {
    /// Whether the destination wants the part bytes transferred.
    pub fn demands_upload(&self) -> bool {
        self.status == STATUS_UPLOAD
    }
}
