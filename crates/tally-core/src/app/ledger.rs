//! AccountLedger - 残高への credit / debit の適用
//!
//! # 不変条件
//! - 残高は適用の結果として決して負にならない
//! - 書き込みは口座 id + version による 1 回の条件付き更新
//! - ストレージ呼び出しはすべて store_timeout で打ち切る（ハングでループを止めない）

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{Account, AccountId, LedgerError, OperationKind};
use crate::ports::{AccountStore, StoreError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

pub struct AccountLedger {
    store: Arc<dyn AccountStore>,
    store_timeout: Duration,
    max_conflict_retries: u32,
}

impl AccountLedger {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// How many version conflicts to absorb by re-reading before giving up transiently.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Apply one credit or debit and return the account as persisted.
    ///
    /// Storage failures come back as `LedgerError::Storage` (transient). Everything else
    /// is a domain error and must not be retried.
    pub async fn apply(
        &self,
        account_id: AccountId,
        kind: &OperationKind,
        amount: i64,
    ) -> Result<Account, LedgerError> {
        let mutate: fn(&mut Account, i64) -> Result<(), LedgerError> = match kind {
            OperationKind::Credit => Account::credit,
            OperationKind::Debit => Account::debit,
            OperationKind::Unknown(_) => return Err(LedgerError::UnsupportedKind(kind.clone())),
        };
        // 残高が負にならないよう、正の量だけを受け付ける
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let mut conflicts = 0;
        loop {
            let mut account = self
                .bounded(self.store.find_by_id(account_id))
                .await?
                .ok_or(LedgerError::AccountNotFound(account_id))?;

            let balance_before = account.balance;
            mutate(&mut account, amount)?;

            match self.bounded(self.store.update(&account)).await {
                Ok(()) => {
                    account.version += 1;
                    debug!(
                        account_id = %account_id,
                        kind = %kind,
                        amount,
                        balance_before,
                        balance_after = account.balance,
                        "balance updated"
                    );
                    return Ok(account);
                }
                Err(StoreError::Conflict { .. }) if conflicts < self.max_conflict_retries => {
                    conflicts += 1;
                    debug!(account_id = %account_id, conflicts, "version conflict, re-reading account");
                }
                Err(err) => {
                    warn!(account_id = %account_id, error = %err, "balance write failed");
                    return Err(err.into());
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }
}
