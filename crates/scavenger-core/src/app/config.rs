//! ScavengerConfig - スキャベンジャーの設定
//!
//! JSON ファイルから読み込みます。省略したフィールドはデフォルト値になります。
//!
//! ```json
//! { "task_batch_size": 32, "audit_task_lists": true }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScavengerConfig {
    /// Page size for the `list_task_list` audit walk.
    pub task_list_page_size: usize,

    /// Tasks fetched (and completed) per round trip while draining a task list.
    pub task_batch_size: usize,

    /// Orphan candidates requested per pass.
    pub orphan_batch_size: usize,

    /// Upper bound on tasks completed for one task list in a single pass.
    pub max_tasks_per_task_list: usize,

    /// Walk every task list after the orphan fast path.
    pub audit_task_lists: bool,

    pub retry_initial_interval_ms: u64,
    pub retry_max_interval_ms: u64,
}

impl Default for ScavengerConfig {
    fn default() -> Self {
        Self {
            task_list_page_size: 32,
            task_batch_size: 16,
            orphan_batch_size: 1000,
            max_tasks_per_task_list: 256,
            audit_task_lists: false,
            retry_initial_interval_ms: 250,
            retry_max_interval_ms: 30_000,
        }
    }
}

impl ScavengerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("task_list_page_size", self.task_list_page_size),
            ("task_batch_size", self.task_batch_size),
            ("orphan_batch_size", self.orphan_batch_size),
            ("max_tasks_per_task_list", self.max_tasks_per_task_list),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
        }
        if self.retry_initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "retry_initial_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry_max_interval_ms < self.retry_initial_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "retry_max_interval_ms ({}) is below retry_initial_interval_ms ({})",
                self.retry_max_interval_ms, self.retry_initial_interval_ms
            )));
        }
        Ok(())
    }

    /// Backoff for idempotent calls (completion, listing, orphan fetch).
    pub fn retry_forever_policy(&self) -> RetryPolicy {
        RetryPolicy::retry_forever().with_intervals(self.initial_interval(), self.max_interval())
    }

    /// Backoff for fenced deletes.
    pub fn delete_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::delete_retry().with_intervals(self.initial_interval(), self.max_interval())
    }

    fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.retry_initial_interval_ms)
    }

    fn max_interval(&self) -> Duration {
        Duration::from_millis(self.retry_max_interval_ms)
    }
}
