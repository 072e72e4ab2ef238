//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Tuning knobs for one migration run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Maximum part migrations in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// When set, an ok register-part receipt whose status differs fails the
    /// part with a protocol error.
    #[serde(default)]
    pub expected_register_status: Option<String>,
}

impl MigrationConfig {
    /// Effective worker count; a configured zero is raised to one.
    pub fn worker_count(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            expected_register_status: None,
        }
    }
}

fn default_concurrency() -> usize {
    1
}
