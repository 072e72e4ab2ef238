//! Capability proofs for the destination namespace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Proof that the caller may register parts and uploads in the destination
/// namespace.
///
/// The delegations themselves are opaque; they are produced by the identity
/// tooling and forwarded verbatim with every invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorization(Vec<Value>);

impl Authorization {
    pub fn new(delegations: Vec<Value>) -> Self {
        Self(delegations)
    }

    pub fn proofs(&self) -> &[Value] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
