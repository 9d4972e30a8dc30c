//! Errors - ドメインエラーと運用分類

use thiserror::Error;

use super::disposition::DeadLetterReason;
use super::ids::AccountId;
use super::operation::OperationKind;
use crate::ports::StoreError;

/// ErrorKind は失敗の運用分類
///
/// - Transient: リトライで回復しうる（ストレージの一時障害など）
/// - Permanent: リトライしても無意味（残高不足、未知の種別など）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Failure while applying an operation to an account.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    #[error("insufficient balance on {account_id}: balance={balance}, requested={requested}")]
    InsufficientBalance {
        account_id: AccountId,
        balance: i64,
        requested: i64,
    },

    #[error("balance overflow on {account_id}: balance={balance}, amount={amount}")]
    BalanceOverflow {
        account_id: AccountId,
        balance: i64,
        amount: i64,
    },

    #[error("operation kind {0} cannot be applied to a balance")]
    UnsupportedKind(OperationKind),

    #[error("amount must be a positive magnitude, got {0}")]
    InvalidAmount(i64),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(_) => ErrorKind::Transient,
            Self::AccountNotFound(_)
            | Self::InsufficientBalance { .. }
            | Self::BalanceOverflow { .. }
            | Self::UnsupportedKind(_)
            | Self::InvalidAmount(_) => ErrorKind::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Dead-letter reason for permanent failures; `None` for transient ones.
    pub fn dead_letter_reason(&self) -> Option<DeadLetterReason> {
        match self {
            Self::AccountNotFound(_) => Some(DeadLetterReason::AccountNotFound),
            Self::InsufficientBalance { .. } => Some(DeadLetterReason::InsufficientBalance),
            Self::BalanceOverflow { .. } => Some(DeadLetterReason::BalanceOverflow),
            Self::UnsupportedKind(_) => Some(DeadLetterReason::UnknownOperationKind),
            Self::InvalidAmount(_) => Some(DeadLetterReason::MalformedPayload),
            Self::Storage(_) => None,
        }
    }
}
