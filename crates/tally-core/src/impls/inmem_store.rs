//! InMemoryAccountStore - 開発・テスト用の口座ストア
//!
//! HashMap<AccountId, Account> を std Mutex で守るだけの実装です。
//! ロックは await を跨がないので、async context でも std Mutex で十分。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{Account, AccountId};
use crate::ports::{AccountStore, StoreError};

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<AccountId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite an account (outside the ledger's conditional write path).
    pub fn insert(&self, account: Account) {
        self.lock().insert(account.id, account);
    }

    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.lock().get(&id).cloned()
    }

    pub fn balance(&self, id: AccountId) -> Option<i64> {
        self.lock().get(&id).map(|account| account.balance)
    }

    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.lock().values().cloned().collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AccountId, Account>> {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.get(id))
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.lock();
        let conflict = StoreError::Conflict {
            account_id: account.id,
            expected_version: account.version,
        };
        // 行がない場合も「読んだ時点と違う」ので conflict 扱い
        let Some(stored) = accounts.get_mut(&account.id) else {
            return Err(conflict);
        };
        if stored.version != account.version {
            return Err(conflict);
        }
        stored.balance = account.balance;
        stored.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_bumps_version() {
        let store = InMemoryAccountStore::new();
        let id = AccountId::random();
        store.insert(Account::new(id, 10));

        let mut account = store.find_by_id(id).await.unwrap().unwrap();
        account.balance = 25;
        store.update(&account).await.unwrap();

        let stored = store.get(id).unwrap();
        assert_eq!(stored.balance, 25);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = InMemoryAccountStore::new();
        let id = AccountId::random();
        store.insert(Account::new(id, 10));

        let first = store.find_by_id(id).await.unwrap().unwrap();
        let mut second = first.clone();

        let mut winner = first;
        winner.balance = 0;
        store.update(&winner).await.unwrap();

        second.balance = 100;
        let result = store.update(&second).await;
        assert!(matches!(
            result,
            Err(StoreError::Conflict {
                expected_version: 0,
                ..
            })
        ));
        assert_eq!(store.balance(id), Some(0));
    }

    #[tokio::test]
    async fn missing_row_is_a_conflict() {
        let store = InMemoryAccountStore::new();
        let result = store.update(&Account::new(AccountId::random(), 1)).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }
}
