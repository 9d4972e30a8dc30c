#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;

use tally_core::app::{AccountLedger, ProcessingLoop};
use tally_core::domain::{Account, AccountId};
use tally_core::impls::{InMemoryAccountStore, InMemoryQueueGateway};
use tally_core::ports::{AccountStore, FixedClock, StoreError};

pub struct TestBed {
    pub gateway: Arc<InMemoryQueueGateway>,
    pub store: Arc<InMemoryAccountStore>,
    pub clock: FixedClock,
    pub worker: ProcessingLoop,
}

impl TestBed {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryAccountStore::new());
        Self::with_store(store.clone(), store)
    }

    /// `store` is what the ledger talks to, `inner` is where accounts actually live.
    pub fn with_store(store: Arc<dyn AccountStore>, inner: Arc<InMemoryAccountStore>) -> Self {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let gateway = Arc::new(InMemoryQueueGateway::new(Arc::new(clock.clone())));
        let worker = ProcessingLoop::new(gateway.clone(), Arc::new(AccountLedger::new(store)))
            .with_clock(Arc::new(clock.clone()));
        Self {
            gateway,
            store: inner,
            clock,
            worker,
        }
    }

    pub fn open_account(&self, balance: i64) -> AccountId {
        let id = AccountId::random();
        self.store.insert(Account::new(id, balance));
        id
    }
}

pub fn payload(kind: &str, account_id: AccountId, amount: i64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": uuid::Uuid::new_v4(),
        "messageType": kind,
        "bankAccountId": account_id,
        "amount": amount,
    }))
    .unwrap()
}

/// Store whose first `failures` writes fail with `Unavailable`.
pub struct FlakyStore {
    inner: Arc<InMemoryAccountStore>,
    failures: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryAccountStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }

    pub fn always_failing(inner: Arc<InMemoryAccountStore>) -> Self {
        Self::new(inner, u32::MAX)
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.update(account).await
    }
}
