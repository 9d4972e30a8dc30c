//! WorkerGroup - 複数の処理ループの起動と停止
//!
//! 1 つの ProcessingLoop 設定を N 本の tokio task で回します。
//! 停止は親トークンの child token 経由なので、親の cancel にも追従します。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use super::status::ProcessingStats;
use super::worker_loop::ProcessingLoop;

/// Worker group handle.
/// - `request_shutdown()` でトークンを cancel するとワーカー全体が止まる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    cancel: CancellationToken,
    joins: Vec<JoinHandle<()>>,
    stats: Arc<ProcessingStats>,
}

impl WorkerGroup {
    /// Spawn `n` loops sharing one `ProcessingLoop` configuration (and its stats).
    ///
    /// `cancel` is the parent token; the group only ever cancels a child of it.
    pub fn spawn(n: usize, worker: Arc<ProcessingLoop>, cancel: &CancellationToken) -> Self {
        let cancel = cancel.child_token();
        let stats = Arc::clone(worker.stats());

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let worker = Arc::clone(&worker);
            let token = cancel.clone();
            let span = info_span!("worker", worker_id);
            joins.push(tokio::spawn(
                async move { worker.run(token).await }.instrument(span),
            ));
        }

        Self {
            cancel,
            joins,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    /// Request shutdown for all workers.
    /// In-flight envelopes still get their disposition; workers just stop polling.
    pub fn request_shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.join().await;
    }

    /// Wait for all workers without requesting shutdown (e.g. parent token cancelled).
    pub async fn join(self) {
        for join in self.joins {
            if let Err(err) = join.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AccountLedger;
    use crate::domain::{Account, AccountId};
    use crate::impls::{InMemoryAccountStore, InMemoryQueueGateway};
    use crate::ports::SystemClock;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_workers_keep_the_balance_exact() {
        let gateway = Arc::new(InMemoryQueueGateway::new(Arc::new(SystemClock)));
        let store = Arc::new(InMemoryAccountStore::new());
        let account_id = AccountId::random();
        store.insert(Account::new(account_id, 1_000));

        for i in 0..40 {
            let kind = if i % 2 == 0 { "Credit" } else { "Debit" };
            let payload = serde_json::json!({
                "id": uuid::Uuid::new_v4(),
                "messageType": kind,
                "bankAccountId": account_id,
                "amount": 7,
            });
            gateway.send(serde_json::to_vec(&payload).unwrap()).await;
        }

        // conflicts are frequent here; give the ledger plenty of re-reads
        let ledger = AccountLedger::new(store.clone()).with_max_conflict_retries(1_000);
        let worker = Arc::new(
            ProcessingLoop::new(gateway.clone(), Arc::new(ledger))
                .with_idle_interval(Duration::from_millis(5)),
        );
        let group = WorkerGroup::spawn(4, worker, &CancellationToken::new());
        assert_eq!(group.len(), 4);

        tokio::time::timeout(Duration::from_secs(10), async {
            while !gateway.is_drained().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let stats = Arc::clone(group.stats());
        group.shutdown_and_join().await;

        assert_eq!(stats.snapshot().completed, 40);
        assert_eq!(store.balance(account_id), Some(1_000));
        assert_eq!(store.get(account_id).unwrap().version, 40);
    }

    #[tokio::test]
    async fn parent_cancellation_stops_the_group() {
        let gateway = Arc::new(InMemoryQueueGateway::new(Arc::new(SystemClock)));
        let store = Arc::new(InMemoryAccountStore::new());
        let worker = Arc::new(
            ProcessingLoop::new(gateway, Arc::new(AccountLedger::new(store)))
                .with_idle_interval(Duration::from_millis(5)),
        );
        let parent = CancellationToken::new();
        let group = WorkerGroup::spawn(2, worker, &parent);

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(5), group.join())
            .await
            .unwrap();
    }
}
