//! ProcessingLoop - キュー処理ループ
//!
//! # フロー
//! 1. QueueGateway::peek() で envelope を取得（なければ idle_interval 待つ）
//! 2. OperationDecoder で Operation にデコード
//! 3. AccountLedger::apply() で残高を更新
//! 4. 結果から Disposition を決めて gateway に反映
//!
//! どの失敗もループの外には出ません。poll の失敗はログして続行、
//! 処理の失敗は必ず何らかの Disposition に落ちます。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::decoder::OperationDecoder;
use super::ledger::AccountLedger;
use super::retry::{RetryDecision, RetryPolicy};
use super::status::ProcessingStats;
use crate::domain::{DeadLetterReason, Disposition, DomainFailurePolicy, Envelope, LedgerError};
use crate::ports::{Clock, GatewayError, QueueGateway, SystemClock};

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);

pub struct ProcessingLoop {
    gateway: Arc<dyn QueueGateway>,
    ledger: Arc<AccountLedger>,
    decoder: OperationDecoder,
    retry_policy: RetryPolicy,
    domain_failure_policy: DomainFailurePolicy,
    clock: Arc<dyn Clock>,
    idle_interval: Duration,
    stats: Arc<ProcessingStats>,
}

impl ProcessingLoop {
    pub fn new(gateway: Arc<dyn QueueGateway>, ledger: Arc<AccountLedger>) -> Self {
        Self {
            gateway,
            ledger,
            decoder: OperationDecoder::new(),
            retry_policy: RetryPolicy::default(),
            domain_failure_policy: DomainFailurePolicy::default(),
            clock: Arc::new(SystemClock),
            idle_interval: DEFAULT_IDLE_INTERVAL,
            stats: Arc::new(ProcessingStats::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_domain_failure_policy(mut self, policy: DomainFailurePolicy) -> Self {
        self.domain_failure_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_idle_interval(mut self, idle_interval: Duration) -> Self {
        self.idle_interval = idle_interval;
        self
    }

    pub fn with_stats(mut self, stats: Arc<ProcessingStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    /// Poll and process until `cancel` fires.
    ///
    /// Cancellation is observed between envelopes and during the idle wait; an envelope
    /// already being processed always receives its disposition first.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("processing loop started");

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.gateway.peek() => polled,
            };

            match polled {
                Ok(Some(envelope)) => {
                    self.process(envelope).await;
                    continue;
                }
                Ok(None) => debug!("queue empty"),
                Err(err) => {
                    self.stats.record_poll_error();
                    warn!(error = %err, "error while reading messages");
                }
            }

            // 空キュー・poll 失敗どちらも idle_interval だけ待つ
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.idle_interval) => {}
            }
        }

        info!("processing loop stopped");
    }

    /// Poll once; process the envelope if there was one.
    pub async fn run_once(&self) -> Result<Option<Disposition>, GatewayError> {
        match self.gateway.peek().await? {
            Some(envelope) => Ok(Some(self.process(envelope).await)),
            None => Ok(None),
        }
    }

    /// Decide and apply the disposition of one envelope. Never fails.
    pub async fn process(&self, envelope: Envelope) -> Disposition {
        let span = info_span!(
            "envelope",
            envelope_id = %envelope.id(),
            processing_count = envelope.processing_count(),
        );

        async {
            let disposition = self.decide(&envelope).await;
            match self.dispose(&envelope, &disposition).await {
                Ok(()) => {
                    self.stats.record(&disposition);
                    debug!(disposition = disposition.label(), "envelope disposed");
                }
                Err(err) => {
                    self.stats.record_disposition_error();
                    error!(
                        disposition = disposition.label(),
                        error = %err,
                        "failed to apply disposition"
                    );
                }
            }
            disposition
        }
        .instrument(span)
        .await
    }

    async fn decide(&self, envelope: &Envelope) -> Disposition {
        let operation = match self.decoder.decode(envelope.payload()) {
            Ok(operation) => operation,
            Err(err) => {
                warn!(error = %err, "message is invalid");
                return Disposition::DeadLettered(DeadLetterReason::MalformedPayload);
            }
        };

        if !operation.kind.is_recognized() {
            warn!(operation_id = %operation.id, kind = %operation.kind, "unsupported operation kind");
            return Disposition::DeadLettered(DeadLetterReason::UnknownOperationKind);
        }

        match self
            .ledger
            .apply(operation.account_id, &operation.kind, operation.amount)
            .await
        {
            Ok(account) => {
                info!(
                    operation_id = %operation.id,
                    account_id = %account.id,
                    kind = %operation.kind,
                    amount = operation.amount,
                    balance = account.balance,
                    "operation applied"
                );
                Disposition::Completed
            }
            Err(err) => match err.dead_letter_reason() {
                Some(reason) => self.on_domain_failure(reason, &err),
                None => self.on_transient_failure(envelope, &err),
            },
        }
    }

    fn on_transient_failure(&self, envelope: &Envelope, err: &LedgerError) -> Disposition {
        let attempts = envelope.processing_count();
        match self.retry_policy.decide(attempts) {
            RetryDecision::Reschedule { delay } => {
                let not_before = self.not_before(delay);
                warn!(error = %err, attempts, ?delay, %not_before, "database update failed, rescheduling");
                Disposition::Rescheduled { delay, not_before }
            }
            RetryDecision::Abandon => {
                warn!(error = %err, attempts, "database update failed, abandoning");
                Disposition::Abandoned
            }
        }
    }

    fn on_domain_failure(&self, reason: DeadLetterReason, err: &LedgerError) -> Disposition {
        match self.domain_failure_policy {
            DomainFailurePolicy::DeadLetter => {
                info!(error = %err, %reason, "operation rejected");
                Disposition::DeadLettered(reason)
            }
            DomainFailurePolicy::Hold => {
                info!(error = %err, %reason, "operation rejected, holding envelope");
                Disposition::Held {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn dispose(&self, envelope: &Envelope, disposition: &Disposition) -> Result<(), GatewayError> {
        match disposition {
            Disposition::Completed => self.gateway.complete(envelope).await,
            Disposition::Rescheduled { not_before, .. } => {
                self.gateway.reschedule(envelope, *not_before).await
            }
            Disposition::Abandoned => self.gateway.abandon(envelope).await,
            Disposition::DeadLettered(reason) => self.gateway.dead_letter(envelope, *reason).await,
            Disposition::Held { .. } => Ok(()),
        }
    }

    fn not_before(&self, delay: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
