//! Scavenger - タスクリストのガベージコレクタ本体
//!
//! ports（TaskListStore, DomainCache）と Lifecycle、2 種類のリトライポリシーを
//! 束ねます。個々のバックエンド操作は `reclaim.rs`、1 回分のパスは `scan.rs` に
//! あります。
//!
//! # 使用例
//! ```ignore
//! let scavenger = Scavenger::new(store, domains, ScavengerConfig::default());
//! scavenger.start();
//! let report = scavenger.run_pass().await?;
//! scavenger.stop();
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::info;

use super::config::ScavengerConfig;
use super::lifecycle::Lifecycle;
use crate::domain::{BackendError, ScavengerError};
use crate::ports::{DomainCache, TaskListStore};
use crate::retry::{RetryPolicy, ThrottleRetry};

pub struct Scavenger {
    pub(crate) store: Arc<dyn TaskListStore>,
    domains: Arc<dyn DomainCache>,
    pub(crate) config: ScavengerConfig,
    lifecycle: Lifecycle,
    retry_forever_policy: RetryPolicy,
    delete_retry_policy: RetryPolicy,
}

impl Scavenger {
    pub fn new(
        store: Arc<dyn TaskListStore>,
        domains: Arc<dyn DomainCache>,
        config: ScavengerConfig,
    ) -> Self {
        let retry_forever_policy = config.retry_forever_policy();
        let delete_retry_policy = config.delete_retry_policy();
        Self {
            store,
            domains,
            config,
            lifecycle: Lifecycle::new(),
            retry_forever_policy,
            delete_retry_policy,
        }
    }

    /// Override both backoff policies (tests use short intervals).
    pub fn with_retry_policies(mut self, forever: RetryPolicy, delete: RetryPolicy) -> Self {
        self.retry_forever_policy = forever;
        self.delete_retry_policy = delete;
        self
    }

    pub fn start(&self) -> bool {
        let won = self.lifecycle.start();
        if won {
            info!("task list scavenger started");
        }
        won
    }

    /// Stops retrying; backend calls already issued are allowed to finish.
    pub fn stop(&self) -> bool {
        let won = self.lifecycle.stop();
        if won {
            info!("task list scavenger stopped");
        }
        won
    }

    /// [`stop`](Self::stop) that tolerates an absent instance.
    pub fn stop_opt(scavenger: Option<&Self>) -> bool {
        scavenger.is_some_and(Self::stop)
    }

    pub fn alive(&self) -> bool {
        self.lifecycle.is_alive()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &ScavengerConfig {
        &self.config
    }

    pub(crate) fn domain_name(&self, domain_id: &str) -> Result<String, ScavengerError> {
        Ok(self.domains.domain_name(domain_id)?)
    }

    /// Every error counts as retryable while the scavenger is alive.
    pub(crate) async fn retry_forever<T, F, Fut>(&self, op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let lifecycle = &self.lifecycle;
        ThrottleRetry::new(
            &self.retry_forever_policy,
            lifecycle.cancellation(),
            |_: &BackendError| lifecycle.is_alive(),
        )
        .run(op)
        .await
    }

    /// Retries only [`BackendError::ServiceBusy`].
    pub(crate) async fn delete_retry<T, F, Fut>(&self, op: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        ThrottleRetry::new(
            &self.delete_retry_policy,
            self.lifecycle.cancellation(),
            BackendError::is_service_busy,
        )
        .run(op)
        .await
    }
}
