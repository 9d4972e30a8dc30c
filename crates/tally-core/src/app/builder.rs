//! WorkerBuilder - 処理ループの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に設定値を検証し、gateway / store が揃っているかをチェック
//! - 不足があれば BuildError を返す（起動後に気付くより早い）

use std::sync::Arc;

use super::ledger::AccountLedger;
use super::status::ProcessingStats;
use super::worker_loop::ProcessingLoop;
use crate::ports::{AccountStore, Clock, QueueGateway, SystemClock};
use crate::settings::{SettingsError, WorkerConfig};

/// WorkerBuilder は WorkerConfig とアダプタから ProcessingLoop を組み立てる
///
/// # 使用例
/// ```ignore
/// let worker = WorkerBuilder::new(WorkerConfig::from_env()?)
///     .gateway(gateway)
///     .store(store)
///     .build()?;
/// ```
pub struct WorkerBuilder {
    config: WorkerConfig,
    gateway: Option<Arc<dyn QueueGateway>>,
    store: Option<Arc<dyn AccountStore>>,
    clock: Arc<dyn Clock>,
    stats: Option<Arc<ProcessingStats>>,
}

/// BuildError は処理ループ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no queue gateway was provided")]
    MissingGateway,

    #[error("no account store was provided")]
    MissingStore,

    #[error(transparent)]
    InvalidConfig(#[from] SettingsError),
}

impl WorkerBuilder {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            gateway: None,
            store: None,
            clock: Arc::new(SystemClock),
            stats: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn QueueGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share counters with other loops (defaults to a fresh set).
    pub fn stats(mut self, stats: Arc<ProcessingStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn build(self) -> Result<ProcessingLoop, BuildError> {
        self.config.validate()?;
        let gateway = self.gateway.ok_or(BuildError::MissingGateway)?;
        let store = self.store.ok_or(BuildError::MissingStore)?;

        let ledger = AccountLedger::new(store)
            .with_store_timeout(self.config.store_timeout())
            .with_max_conflict_retries(self.config.max_conflict_retries);

        let mut worker = ProcessingLoop::new(gateway, Arc::new(ledger))
            .with_retry_policy(self.config.retry_policy())
            .with_domain_failure_policy(self.config.domain_failure_policy)
            .with_idle_interval(self.config.idle_interval())
            .with_clock(self.clock);
        if let Some(stats) = self.stats {
            worker = worker.with_stats(stats);
        }
        Ok(worker)
    }
}
