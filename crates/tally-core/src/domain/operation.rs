//! Operation - デコード済みの金融オペレーション

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, OperationId};

/// What an operation does to a balance.
///
/// Unrecognized `messageType` strings decode successfully into `Unknown` so that the
/// dispatch step, not the decoder, owns the "unknown kinds are not retryable" policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Credit,
    Debit,
    Unknown(String),
}

impl OperationKind {
    pub fn parse(message_type: &str) -> Self {
        match message_type {
            "Credit" => Self::Credit,
            "Debit" => Self::Debit,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Credit | Self::Debit)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => f.write_str("Credit"),
            Self::Debit => f.write_str("Debit"),
            Self::Unknown(raw) => write!(f, "Unknown({raw})"),
        }
    }
}

/// A decoded, immutable operation. Derived per poll and dropped after one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    pub account_id: AccountId,
    /// Positive magnitude; `kind` decides the sign of the effect.
    pub amount: i64,
}
