//! Disposition - envelope の最終的な扱い
//!
//! 処理ループは 1 つの envelope につき必ず 1 つの Disposition を決めます。
//! Completed / DeadLettered / Abandoned が吸収状態、Rescheduled は再配送待ち、
//! Held はドメインエラーを「何もしない」で保留する明示的な選択肢です。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Why an envelope was moved to the dead-letter queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Payload could not be decoded into an operation.
    MalformedPayload,
    /// `messageType` was neither Credit nor Debit.
    UnknownOperationKind,
    /// Debit larger than the balance.
    InsufficientBalance,
    /// Target account does not exist.
    AccountNotFound,
    /// Credit would overflow the balance.
    BalanceOverflow,
    /// Transport gave up after too many deliveries.
    MaxDeliveryCountExceeded,
}

impl DeadLetterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedPayload => "malformed_payload",
            Self::UnknownOperationKind => "unknown_operation_kind",
            Self::InsufficientBalance => "insufficient_balance",
            Self::AccountNotFound => "account_not_found",
            Self::BalanceOverflow => "balance_overflow",
            Self::MaxDeliveryCountExceeded => "max_delivery_count_exceeded",
        }
    }
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with an envelope whose operation failed for a domain reason
/// (insufficient balance, missing account, overflow).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainFailurePolicy {
    /// Move it to the dead-letter queue with the matching reason.
    #[default]
    DeadLetter,
    /// Leave it without a disposition (`Disposition::Held`).
    Hold,
}

/// The outcome the processing loop decided for one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Applied; envelope removed from the queue.
    Completed,

    /// Transient failure; invisible until `not_before`.
    Rescheduled {
        delay: Duration,
        not_before: DateTime<Utc>,
    },

    /// Transient failure past the reschedule budget; visible again immediately.
    Abandoned,

    /// Permanently unprocessable.
    DeadLettered(DeadLetterReason),

    /// Domain failure left without a disposition; the envelope stays locked until the
    /// transport's own expiry.
    Held { reason: String },
}

impl Disposition {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rescheduled { .. } => "rescheduled",
            Self::Abandoned => "abandoned",
            Self::DeadLettered(_) => "dead_lettered",
            Self::Held { .. } => "held",
        }
    }

    /// Does this disposition take the envelope out of the main queue for good?
    pub fn leaves_queue(&self) -> bool {
        matches!(self, Self::Completed | Self::DeadLettered(_))
    }
}
