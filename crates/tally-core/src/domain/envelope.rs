//! Envelope - キューから届く配送単位
//!
//! Envelope は Queue Gateway が所有します。処理ループは読むだけで、
//! 状態の変更は gateway への disposition 要求（complete / reschedule / ...）で行います。

use serde::{Deserialize, Serialize};

use super::ids::EnvelopeId;

/// A single delivery unit: raw payload plus delivery metadata.
///
/// `processing_count` is owned by the transport. It starts at 0 and is bumped by the
/// gateway each time the envelope is rescheduled or abandoned, so it survives redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    id: EnvelopeId,
    payload: Vec<u8>,
    processing_count: u32,
}

impl Envelope {
    pub fn new(id: EnvelopeId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
            processing_count: 0,
        }
    }

    /// Rebuild an envelope with a known delivery count (adapters restoring transport state).
    pub fn with_processing_count(mut self, processing_count: u32) -> Self {
        self.processing_count = processing_count;
        self
    }

    pub fn id(&self) -> EnvelopeId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn processing_count(&self) -> u32 {
        self.processing_count
    }
}
