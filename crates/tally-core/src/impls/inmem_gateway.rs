//! In-memory queue gateway.
//!
//! Reference transport for development and tests. It behaves like a peek-lock queue:
//! a peeked envelope is locked (in flight) until the receiver decides its disposition.
//!
//! Locks never expire unless `with_lock_duration` is set. Without it, an envelope left
//! without a disposition (`Disposition::Held`) stays in flight for the gateway's lifetime.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{DeadLetterReason, Envelope, EnvelopeId};
use crate::ports::{Clock, GatewayError, IdGenerator, QueueGateway, UlidGenerator};

/// Scheduled envelope entry for the priority queue.
///
/// We use Reverse ordering so BinaryHeap acts as a min-heap (earliest first).
/// `seq` keeps FIFO order among envelopes scheduled for the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledEnvelope {
    not_before: DateTime<Utc>,
    seq: u64,
    envelope_id: EnvelopeId,
}

impl PartialOrd for ScheduledEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEnvelope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .not_before
            .cmp(&self.not_before)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// An envelope parked in the dead-letter queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub envelope: Envelope,
    pub reason: DeadLetterReason,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Queue depth by state, for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub ready: usize,
    pub scheduled: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub dead_lettered: usize,
}

#[derive(Default)]
struct GatewayState {
    /// Every envelope still owned by the main queue (ready, scheduled or in flight).
    envelopes: HashMap<EnvelopeId, Envelope>,

    /// Visible now, in arrival order.
    ready: VecDeque<EnvelopeId>,

    /// Invisible until their `not_before`.
    scheduled: BinaryHeap<ScheduledEnvelope>,

    /// Peeked and locked by a receiver; value is the lock expiry, if any.
    in_flight: HashMap<EnvelopeId, Option<DateTime<Utc>>>,

    dead_letters: Vec<DeadLetter>,
    completed: usize,
    next_seq: u64,
}

impl GatewayState {
    /// Move envelopes from scheduled to ready if their time has come.
    fn promote_scheduled(&mut self, now: DateTime<Utc>) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.not_before > now {
                break; // Heap is sorted, so we can stop
            }
            if let Some(entry) = self.scheduled.pop() {
                self.ready.push_back(entry.envelope_id);
            }
        }
    }

    /// Expired locks count as a delivery: bump the count and make the envelope visible
    /// again (or dead-letter it once `max_delivery_count` is reached).
    fn release_expired_locks(&mut self, now: DateTime<Utc>, max_delivery_count: Option<u32>) {
        let mut expired: Vec<(DateTime<Utc>, EnvelopeId)> = self
            .in_flight
            .iter()
            .filter_map(|(id, locked_until)| match locked_until {
                Some(until) if *until <= now => Some((*until, *id)),
                _ => None,
            })
            .collect();
        expired.sort();

        for (_, id) in expired {
            let count = match self.take_in_flight(id) {
                Ok(stored) => {
                    let count = stored.processing_count().saturating_add(1);
                    *stored = stored.clone().with_processing_count(count);
                    count
                }
                Err(_) => continue,
            };
            debug!(envelope_id = %id, count, "lock expired");
            match max_delivery_count {
                Some(max) if count >= max => {
                    self.push_dead_letter(id, DeadLetterReason::MaxDeliveryCountExceeded, now);
                }
                _ => self.ready.push_back(id),
            }
        }
    }

    /// Release the lock on an in-flight envelope, handing back the stored copy.
    fn take_in_flight(&mut self, id: EnvelopeId) -> Result<&mut Envelope, GatewayError> {
        if self.in_flight.remove(&id).is_none() {
            return Err(GatewayError::UnknownEnvelope(id));
        }
        self.envelopes
            .get_mut(&id)
            .ok_or(GatewayError::UnknownEnvelope(id))
    }

    fn push_dead_letter(&mut self, id: EnvelopeId, reason: DeadLetterReason, now: DateTime<Utc>) {
        if let Some(envelope) = self.envelopes.remove(&id) {
            self.dead_letters.push(DeadLetter {
                envelope,
                reason,
                dead_lettered_at: now,
            });
        }
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            ready: self.ready.len(),
            scheduled: self.scheduled.len(),
            in_flight: self.in_flight.len(),
            completed: self.completed,
            dead_lettered: self.dead_letters.len(),
        }
    }
}

/// In-memory peek-lock queue implementing [`QueueGateway`].
pub struct InMemoryQueueGateway {
    state: Mutex<GatewayState>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
    max_delivery_count: Option<u32>,
    lock_duration: Option<Duration>,
}

impl InMemoryQueueGateway {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(GatewayState::default()),
            ids: Box::new(UlidGenerator::new(clock.clone())),
            clock,
            max_delivery_count: None,
            lock_duration: None,
        }
    }

    /// Expire a peek lock after `duration` without a disposition, as a broker would.
    pub fn with_lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    /// Dead-letter an abandoned envelope once its `processing_count` reaches `max`.
    pub fn with_max_delivery_count(mut self, max: u32) -> Self {
        self.max_delivery_count = Some(max);
        self
    }

    /// Producer side: publish a payload and return the id the transport assigned.
    pub async fn send(&self, payload: impl Into<Vec<u8>>) -> EnvelopeId {
        let id = self.ids.generate_envelope_id();
        let mut state = self.state.lock().await;
        state.envelopes.insert(id, Envelope::new(id, payload));
        state.ready.push_back(id);
        id
    }

    /// Current transport-side view of an envelope still in the main queue.
    pub async fn envelope(&self, id: EnvelopeId) -> Option<Envelope> {
        self.state.lock().await.envelopes.get(&id).cloned()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }

    pub async fn counts(&self) -> QueueCounts {
        self.state.lock().await.counts()
    }

    /// Nothing left to deliver: no ready, scheduled or in-flight envelopes.
    pub async fn is_drained(&self) -> bool {
        self.state.lock().await.envelopes.is_empty()
    }

    /// Earliest `not_before` among scheduled envelopes.
    pub async fn next_scheduled_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.scheduled.iter().map(|entry| entry.not_before).min()
    }
}

#[async_trait]
impl QueueGateway for InMemoryQueueGateway {
    async fn peek(&self) -> Result<Option<Envelope>, GatewayError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.release_expired_locks(now, self.max_delivery_count);
        state.promote_scheduled(now);

        let locked_until = self
            .lock_duration
            .and_then(|duration| chrono::Duration::from_std(duration).ok())
            .and_then(|duration| now.checked_add_signed(duration));

        while let Some(id) = state.ready.pop_front() {
            // dead-letter 済みなどで消えた id は読み飛ばす
            let Some(envelope) = state.envelopes.get(&id).cloned() else {
                continue;
            };
            state.in_flight.insert(id, locked_until);
            return Ok(Some(envelope));
        }
        Ok(None)
    }

    async fn complete(&self, envelope: &Envelope) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        state.take_in_flight(envelope.id())?;
        state.envelopes.remove(&envelope.id());
        state.completed += 1;
        Ok(())
    }

    async fn abandon(&self, envelope: &Envelope) -> Result<(), GatewayError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let stored = state.take_in_flight(envelope.id())?;
        let count = stored.processing_count().saturating_add(1);
        *stored = stored.clone().with_processing_count(count);

        match self.max_delivery_count {
            Some(max) if count >= max => {
                debug!(envelope_id = %envelope.id(), count, max, "max delivery count reached");
                state.push_dead_letter(
                    envelope.id(),
                    DeadLetterReason::MaxDeliveryCountExceeded,
                    now,
                );
            }
            _ => state.ready.push_back(envelope.id()),
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        envelope: &Envelope,
        not_before: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        let stored = state.take_in_flight(envelope.id())?;
        let count = stored.processing_count().saturating_add(1);
        *stored = stored.clone().with_processing_count(count);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.scheduled.push(ScheduledEnvelope {
            not_before,
            seq,
            envelope_id: envelope.id(),
        });
        Ok(())
    }

    async fn dead_letter(
        &self,
        envelope: &Envelope,
        reason: DeadLetterReason,
    ) -> Result<(), GatewayError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        state.take_in_flight(envelope.id())?;
        state.push_dead_letter(envelope.id(), reason, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use std::time::Duration;

    fn gateway() -> (InMemoryQueueGateway, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        (InMemoryQueueGateway::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn peek_on_empty_queue_returns_none() {
        let (gateway, _) = gateway();
        assert_eq!(gateway.peek().await.unwrap(), None);
    }

    #[tokio::test]
    async fn peek_locks_until_disposition() {
        let (gateway, _) = gateway();
        let id = gateway.send(b"a".to_vec()).await;

        let envelope = gateway.peek().await.unwrap().unwrap();
        assert_eq!(envelope.id(), id);
        assert_eq!(envelope.processing_count(), 0);

        // locked: a second receiver sees nothing
        assert_eq!(gateway.peek().await.unwrap(), None);
        assert_eq!(gateway.counts().await.in_flight, 1);

        gateway.complete(&envelope).await.unwrap();
        let counts = gateway.counts().await;
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.in_flight, 0);
        assert!(gateway.is_drained().await);
    }

    #[tokio::test]
    async fn fifo_order() {
        let (gateway, _) = gateway();
        let first = gateway.send(b"1".to_vec()).await;
        let second = gateway.send(b"2".to_vec()).await;

        assert_eq!(gateway.peek().await.unwrap().unwrap().id(), first);
        assert_eq!(gateway.peek().await.unwrap().unwrap().id(), second);
    }

    #[tokio::test]
    async fn reschedule_hides_until_not_before_and_bumps_count() {
        let (gateway, clock) = gateway();
        gateway.send(b"a".to_vec()).await;
        let envelope = gateway.peek().await.unwrap().unwrap();

        let not_before = clock.now() + chrono::Duration::seconds(5);
        gateway.reschedule(&envelope, not_before).await.unwrap();
        assert_eq!(gateway.counts().await.scheduled, 1);
        assert_eq!(gateway.next_scheduled_at().await, Some(not_before));

        clock.advance(Duration::from_secs(4));
        assert_eq!(gateway.peek().await.unwrap(), None);

        clock.advance(Duration::from_secs(1));
        let redelivered = gateway.peek().await.unwrap().unwrap();
        assert_eq!(redelivered.id(), envelope.id());
        assert_eq!(redelivered.processing_count(), 1);
    }

    #[tokio::test]
    async fn abandon_is_immediately_visible() {
        let (gateway, _) = gateway();
        gateway.send(b"a".to_vec()).await;
        let envelope = gateway.peek().await.unwrap().unwrap();

        gateway.abandon(&envelope).await.unwrap();

        let redelivered = gateway.peek().await.unwrap().unwrap();
        assert_eq!(redelivered.processing_count(), 1);
    }

    #[tokio::test]
    async fn abandon_past_max_delivery_count_dead_letters() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let gateway = InMemoryQueueGateway::new(Arc::new(clock)).with_max_delivery_count(2);
        gateway.send(b"a".to_vec()).await;

        let envelope = gateway.peek().await.unwrap().unwrap();
        gateway.abandon(&envelope).await.unwrap();
        let envelope = gateway.peek().await.unwrap().unwrap();
        gateway.abandon(&envelope).await.unwrap();

        assert_eq!(gateway.peek().await.unwrap(), None);
        let dead = gateway.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, DeadLetterReason::MaxDeliveryCountExceeded);
        assert_eq!(dead[0].envelope.processing_count(), 2);
    }

    #[tokio::test]
    async fn dead_letter_records_reason() {
        let (gateway, clock) = gateway();
        gateway.send(b"garbage".to_vec()).await;
        let envelope = gateway.peek().await.unwrap().unwrap();

        gateway
            .dead_letter(&envelope, DeadLetterReason::MalformedPayload)
            .await
            .unwrap();

        let dead = gateway.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, DeadLetterReason::MalformedPayload);
        assert_eq!(dead[0].envelope.payload(), b"garbage");
        assert_eq!(dead[0].dead_lettered_at, clock.now());
        assert!(gateway.is_drained().await);
    }

    #[tokio::test]
    async fn disposition_of_unlocked_envelope_fails() {
        let (gateway, _) = gateway();
        gateway.send(b"a".to_vec()).await;
        let envelope = gateway.peek().await.unwrap().unwrap();
        gateway.complete(&envelope).await.unwrap();

        let err = gateway.complete(&envelope).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownEnvelope(id) if id == envelope.id()));
    }

    #[tokio::test]
    async fn locks_never_expire_by_default() {
        let (gateway, clock) = gateway();
        gateway.send(b"a".to_vec()).await;
        gateway.peek().await.unwrap().unwrap();

        clock.advance(Duration::from_secs(24 * 3600));

        assert_eq!(gateway.peek().await.unwrap(), None);
        assert_eq!(gateway.counts().await.in_flight, 1);
    }

    #[tokio::test]
    async fn expired_lock_redelivers_with_bumped_count() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let gateway = InMemoryQueueGateway::new(Arc::new(clock.clone()))
            .with_lock_duration(Duration::from_secs(30));
        let id = gateway.send(b"a".to_vec()).await;
        let held = gateway.peek().await.unwrap().unwrap();

        clock.advance(Duration::from_secs(29));
        assert_eq!(gateway.peek().await.unwrap(), None);

        clock.advance(Duration::from_secs(1));
        let redelivered = gateway.peek().await.unwrap().unwrap();
        assert_eq!(redelivered.id(), id);
        assert_eq!(redelivered.processing_count(), 1);
        assert_eq!(redelivered.payload(), held.payload());
        assert_eq!(gateway.counts().await.in_flight, 1);
    }

    #[tokio::test]
    async fn expired_lock_past_max_delivery_count_dead_letters() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let gateway = InMemoryQueueGateway::new(Arc::new(clock.clone()))
            .with_lock_duration(Duration::from_secs(30))
            .with_max_delivery_count(1);
        gateway.send(b"a".to_vec()).await;
        gateway.peek().await.unwrap().unwrap();

        clock.advance(Duration::from_secs(30));

        assert_eq!(gateway.peek().await.unwrap(), None);
        let dead = gateway.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, DeadLetterReason::MaxDeliveryCountExceeded);
        assert!(gateway.is_drained().await);
    }

    #[test]
    fn scheduled_heap_pops_earliest_first() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut heap = BinaryHeap::new();
        for (seq, secs) in [(0, 125), (1, 5), (2, 25), (3, 5)] {
            heap.push(ScheduledEnvelope {
                not_before: base + chrono::Duration::seconds(secs),
                seq,
                envelope_id: EnvelopeId::random(),
            });
        }

        let order: Vec<(i64, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|e| ((e.not_before - base).num_seconds(), e.seq))
            .collect();
        assert_eq!(order, vec![(5, 1), (5, 3), (25, 2), (125, 0)]);
    }
}
