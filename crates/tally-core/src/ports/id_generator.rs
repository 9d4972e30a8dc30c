//! IdGenerator port - envelope ID の生成
//!
//! トランスポートが envelope に付ける ID を生成します。
//! ULID を使うので、生成順（= 投入順）でソートできます。

use crate::domain::EnvelopeId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は分散環境で使える envelope ID を生成
pub trait IdGenerator: Send + Sync {
    fn generate_envelope_id(&self) -> EnvelopeId;
}

/// UlidGenerator は Clock ベースの ULID 生成器
///
/// FixedClock を渡すと timestamp 部分が決定的になります（ランダム部分は残る）。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_envelope_id(&self) -> EnvelopeId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        EnvelopeId::from(ulid)
    }
}
