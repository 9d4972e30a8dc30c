//! QueueGateway port - 配送キュー（Service Bus / SQS / InMemory）
//!
//! 物理的なトランスポートは外部コラボレータです。コアが必要とするのは
//! peek と 4 種類の disposition だけです。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{DeadLetterReason, Envelope, EnvelopeId};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("envelope {0} is not locked by this receiver")]
    UnknownEnvelope(EnvelopeId),

    #[error("queue transport unavailable: {0}")]
    Unavailable(String),
}

/// QueueGateway はキューの受信側インターフェース
///
/// # 設計原則
/// - at-least-once 配送を前提とする（再配送は起こりうる）
/// - `processing_count` は gateway の所有物。reschedule / abandon のたびに
///   gateway が 1 増やし、再配送後の envelope にも反映される
/// - peek で返した envelope は disposition が決まるまで他の受信者から見えない
#[async_trait]
pub trait QueueGateway: Send + Sync {
    /// Next visible envelope, if any.
    async fn peek(&self) -> Result<Option<Envelope>, GatewayError>;

    /// Success: remove the envelope permanently.
    async fn complete(&self, envelope: &Envelope) -> Result<(), GatewayError>;

    /// Make the envelope visible again immediately. Bumps `processing_count`.
    async fn abandon(&self, envelope: &Envelope) -> Result<(), GatewayError>;

    /// Hide the envelope until `not_before`. Bumps `processing_count`.
    async fn reschedule(
        &self,
        envelope: &Envelope,
        not_before: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    /// Move the envelope to the dead-letter queue for inspection.
    async fn dead_letter(
        &self,
        envelope: &Envelope,
        reason: DeadLetterReason,
    ) -> Result<(), GatewayError>;
}
