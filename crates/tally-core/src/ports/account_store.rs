//! AccountStore port - 残高の正本（source of truth）
//!
//! ストレージエンジンの中身は対象外です。コアが要求するのは
//! id による検索と、version による条件付き更新だけです。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{Account, AccountId};

/// Storage-layer failure. Every variant is transient from the ledger's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage call exceeded {0:?}")]
    Timeout(Duration),

    #[error("version conflict on {account_id}: expected version {expected_version}")]
    Conflict {
        account_id: AccountId,
        expected_version: u64,
    },
}

/// AccountStore は口座を永続化する
///
/// # 設計原則
/// - `update` は 1 行のアトミックな条件付き書き込み
///   （保存済み version == account.version のときだけ成功し、version を +1 する）
/// - 複数ワーカーが同じ口座を更新しても、直列化点はここだけ
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn update(&self, account: &Account) -> Result<(), StoreError>;
}
