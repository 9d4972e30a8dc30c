//! OperationDecoder - payload bytes から Operation へ
//!
//! Wire 形式（JSON）:
//! ```json
//! { "id": "<uuid>", "messageType": "Credit", "bankAccountId": "<uuid>", "amount": 100 }
//! ```
//! 未知のフィールド・欠けたフィールドはデコード失敗です。
//! 未知の messageType はデコード成功（`OperationKind::Unknown`）で、判断は dispatch 側。

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{AccountId, Operation, OperationId, OperationKind};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("amount must be a positive magnitude, got {0}")]
    InvalidAmount(i64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OperationPayload {
    id: OperationId,
    message_type: String,
    bank_account_id: AccountId,
    amount: i64,
}

/// Stateless payload decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationDecoder;

impl OperationDecoder {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, payload: &[u8]) -> Result<Operation, DecodeError> {
        let raw: OperationPayload = serde_json::from_slice(payload)?;
        if raw.amount <= 0 {
            return Err(DecodeError::InvalidAmount(raw.amount));
        }
        Ok(Operation {
            id: raw.id,
            kind: OperationKind::parse(&raw.message_type),
            account_id: raw.bank_account_id,
            amount: raw.amount,
        })
    }
}
