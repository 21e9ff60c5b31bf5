//! Calendar-driven transaction scheduler.
//!
//! State machine: `Stopped → Running` on start (refused when the
//! calendar gateway is unauthenticated), `Running → Stopped` on stop.
//! While running, a fixed-interval tick fetches the next 24h of events,
//! extracts intents, and executes due queue entries sequentially. An
//! in-flight tick always runs to completion; stop takes effect at the
//! next select point.
//!
//! The queue and processed-set live in process memory only. A restart
//! forgets in-flight scheduling state: mid-retry entries restart at
//! attempt 0, and previously seen events are only skipped if their
//! calendar annotation carries a done marker.

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::context::RuntimeContext;
use crate::gateway::CalendarGateway;
use crate::executor::TransactionExecutor;
use crate::intent_parser;
use crate::model::{
    ExecutionOutcome, ExecutionResult, ParsedIntent, QueuedEntry, ScheduledIntentRecord,
    ScheduledStatus,
};
use crate::recorder::LedgerAuditRecorder;
use crate::wallet::NamespaceWallet;

pub const EXECUTED_MARKER: &str = "✅ Executed";
pub const FAILED_MARKER: &str = "❌ Failed";

fn has_done_marker(description: &str) -> bool {
    description.contains(EXECUTED_MARKER) || description.contains(FAILED_MARKER)
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Calendar gateway is not authenticated")]
    NotAuthenticated,
    #[error("Scheduler is already running")]
    AlreadyRunning,
    #[error("Scheduler is not running")]
    NotRunning,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
    pub max_retries: u32,
    pub lookahead_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_retries: 3,
            lookahead_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub total_checks: u64,
    pub transactions_detected: u64,
    pub transactions_executed: u64,
    pub transactions_failed: u64,
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub stats: SchedulerStats,
}

/// One queue entry as reported by the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct QueueView {
    pub event_id: String,
    pub title: String,
    pub kind: String,
    pub from_asset: String,
    pub to_target: String,
    pub amount: String,
    pub due_at: DateTime<Utc>,
    pub seconds_until_due: i64,
    pub attempts: u32,
}

/// All mutable scheduler state, owned by the scheduler and injectable
/// for tests. Not ambient globals.
#[derive(Default)]
struct SchedulerState {
    queue: Vec<QueuedEntry>,
    processed: HashSet<String>,
    stats: SchedulerStats,
    running: bool,
}

pub struct TransactionScheduler {
    calendar: Arc<dyn CalendarGateway>,
    executor: Arc<TransactionExecutor>,
    recorder: Arc<LedgerAuditRecorder>,
    wallet: Arc<NamespaceWallet>,
    /// The namespace this scheduler transacts for (the calendar id).
    namespace: String,
    config: SchedulerConfig,
    ctx: RuntimeContext,
    state: RwLock<SchedulerState>,
    stop_tx: Mutex<Option<watch::Sender<bool>>>,
}

impl TransactionScheduler {
    pub fn new(
        calendar: Arc<dyn CalendarGateway>,
        executor: Arc<TransactionExecutor>,
        recorder: Arc<LedgerAuditRecorder>,
        wallet: Arc<NamespaceWallet>,
        namespace: String,
        config: SchedulerConfig,
        ctx: RuntimeContext,
    ) -> Self {
        Self {
            calendar,
            executor,
            recorder,
            wallet,
            namespace,
            config,
            ctx,
            state: RwLock::new(SchedulerState::default()),
            stop_tx: Mutex::new(None),
        }
    }

    /// Enter `Running` and spawn the polling task. Refuses to start when
    /// the calendar gateway is not authenticated. The running slot is
    /// claimed before the auth probe, so two concurrent starts can never
    /// both spawn a loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        {
            let mut state = self.state.write();
            if state.running {
                return Err(SchedulerError::AlreadyRunning);
            }
            state.running = true;
        }

        if !self.calendar.is_authenticated().await {
            self.state.write().running = false;
            return Err(SchedulerError::NotAuthenticated);
        }

        let (tx, mut rx) = watch::channel(false);
        *self.stop_tx.lock() = Some(tx);

        let scheduler = self.clone();
        let interval_secs = self.config.poll_interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        // A tick runs to completion before stop is observed.
                        scheduler.run_tick().await;
                    }
                    _ = rx.changed() => {
                        info!("Scheduler loop stopped");
                        break;
                    }
                }
            }
        });

        info!(
            namespace = %self.namespace,
            poll_interval_secs = interval_secs,
            max_retries = self.config.max_retries,
            "Scheduler running"
        );
        Ok(())
    }

    /// Leave `Running`. Cancels any scheduled-but-not-yet-fired tick.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        let Some(tx) = self.stop_tx.lock().take() else {
            return Err(SchedulerError::NotRunning);
        };
        let _ = tx.send(true);
        self.state.write().running = false;
        info!("Scheduler stopped");
        Ok(())
    }

    pub fn status(&self) -> SchedulerStatus {
        let state = self.state.read();
        SchedulerStatus {
            running: state.running,
            stats: state.stats.clone(),
        }
    }

    /// Pending entries in execution order, with time-until-due computed
    /// against the scheduler clock.
    pub fn queue(&self) -> Vec<QueueView> {
        let now = self.ctx.clock.now();
        self.state
            .read()
            .queue
            .iter()
            .map(|entry| QueueView {
                event_id: entry.intent.source_event_id.clone(),
                title: entry.intent.source_title.clone(),
                kind: entry.intent.kind.as_str().to_string(),
                from_asset: entry.intent.from_asset.clone(),
                to_target: entry.intent.to_target.clone(),
                amount: entry.intent.amount.clone(),
                due_at: entry.intent.due_at,
                seconds_until_due: (entry.intent.due_at - now).num_seconds(),
                attempts: entry.attempts,
            })
            .collect()
    }

    /// Administrative escape hatch: forget every terminal event id so
    /// previously seen events can be reprocessed. Dangerous; an already
    /// executed event whose calendar annotation was lost will execute
    /// again.
    pub fn clear_processed_cache(&self) -> usize {
        let mut state = self.state.write();
        let cleared = state.processed.len();
        state.processed.clear();
        warn!(cleared, "Processed-event cache cleared");
        cleared
    }

    /// One scheduler tick: fetch the event window, queue new intents,
    /// execute due entries sequentially, then refresh stats.
    pub async fn run_tick(&self) {
        let now = self.ctx.clock.now();
        // The window reaches back by the grace buffer so an event whose
        // start fell between two ticks is still fetched; validation
        // enforces the same bound on staleness.
        let window_start = now - Duration::seconds(intent_parser::PAST_DUE_GRACE_SECS);
        let window_end = now + Duration::hours(self.config.lookahead_hours);

        match self.calendar.events_between(window_start, window_end).await {
            Ok(events) => {
                for event in events {
                    self.consider_event(&event.id, &event.title, &event.description, event.start_time, now)
                        .await;
                }
            }
            Err(e) => {
                // Leave events unresolved; next tick retries the fetch.
                warn!(error = %e, "Calendar fetch failed");
            }
        }

        self.execute_due(now).await;

        let mut state = self.state.write();
        state.stats.total_checks += 1;
        state.stats.queue_size = state.queue.len();
    }

    async fn consider_event(
        &self,
        event_id: &str,
        title: &str,
        description: &str,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        {
            let state = self.state.read();
            if state.processed.contains(event_id) {
                return;
            }
            // Insertion is idempotent: an event already queued is not
            // re-inserted.
            if state
                .queue
                .iter()
                .any(|e| e.intent.source_event_id == event_id)
            {
                return;
            }
        }

        if has_done_marker(description) {
            self.state.write().processed.insert(event_id.to_string());
            return;
        }

        let intent = intent_parser::parse_and_validate(event_id, title, start_time, now);
        if !intent.valid {
            // Validation errors are dropped at parse time, never queued.
            debug!(event_id = %event_id, error = ?intent.error, "Event did not yield a valid intent");
            return;
        }

        info!(
            event_id = %event_id,
            kind = %intent.kind.as_str(),
            amount = %intent.amount,
            due_at = %intent.due_at,
            "Transaction intent detected"
        );

        let entry = QueuedEntry {
            intent: intent.clone(),
            namespace: self.namespace.clone(),
            enqueued_at: now,
            attempts: 0,
        };
        {
            let mut state = self.state.write();
            state.queue.push(entry);
            state.stats.transactions_detected += 1;
        }

        self.announce_intent(&intent, now).await;
    }

    /// Pre-announce the commitment on the ledger. Best-effort.
    async fn announce_intent(&self, intent: &ParsedIntent, now: DateTime<Utc>) {
        let record = ScheduledIntentRecord {
            scheduled_time: intent.due_at,
            intent_id: intent.source_event_id.clone(),
            owner_address: self.wallet.address(&self.namespace),
            kind: intent.kind,
            from_asset: intent.from_asset.clone(),
            to_asset: intent.to_target.clone(),
            amount: Decimal::from_str(&intent.amount).unwrap_or(Decimal::ZERO),
            description: intent.source_title.clone(),
            created_at: now,
            status: ScheduledStatus::Scheduled,
        };
        if let Err(e) = self.recorder.record_scheduled_intent(&record).await {
            warn!(event_id = %intent.source_event_id, error = %e, "Intent pre-announcement failed");
        }
    }

    async fn execute_due(&self, now: DateTime<Utc>) {
        let due: Vec<QueuedEntry> = {
            let state = self.state.read();
            state
                .queue
                .iter()
                .filter(|e| e.intent.due_at <= now)
                .cloned()
                .collect()
        };

        // Due items run sequentially; execution order is queue order.
        for entry in due {
            let event_id = entry.intent.source_event_id.clone();

            if entry.attempts >= self.config.max_retries {
                self.finalize_failure(&event_id, entry.attempts, "retry limit reached")
                    .await;
                continue;
            }

            match self.executor.execute(&entry.intent, &entry.namespace).await {
                ExecutionOutcome::NotDue { seconds_until_due } => {
                    debug!(event_id = %event_id, seconds_until_due, "Entry not due yet");
                }
                ExecutionOutcome::Done(result) if result.success => {
                    self.finalize_success(&event_id, &result).await;
                }
                ExecutionOutcome::Done(result) => {
                    let reason = result
                        .error
                        .unwrap_or_else(|| "unknown execution error".to_string());
                    let attempts_now = {
                        let mut state = self.state.write();
                        match state
                            .queue
                            .iter_mut()
                            .find(|e| e.intent.source_event_id == event_id)
                        {
                            Some(e) => {
                                e.attempts += 1;
                                e.attempts
                            }
                            None => continue,
                        }
                    };

                    if attempts_now >= self.config.max_retries {
                        self.finalize_failure(&event_id, attempts_now, &reason).await;
                    } else {
                        warn!(
                            event_id = %event_id,
                            attempt = attempts_now,
                            max_retries = self.config.max_retries,
                            error = %reason,
                            "Execution failed; will retry"
                        );
                    }
                }
            }
        }
    }

    /// Terminal success: annotate the calendar, remember the event id,
    /// drop the queue entry, bump the success counter.
    async fn finalize_success(&self, event_id: &str, result: &ExecutionResult) {
        let tx_ref = result.chain_tx_ref.as_deref().unwrap_or("-");
        let mut note = format!("{}: tx {}", EXECUTED_MARKER, tx_ref);
        if let Some(received) = result.amount_received {
            note.push_str(&format!(" | received {}", received));
        }
        if let Some(audit_ref) = &result.audit_ref {
            note.push_str(&format!(" | audit {}", audit_ref));
        }
        if let Err(e) = self.calendar.append_description(event_id, &note).await {
            warn!(event_id = %event_id, error = %e, "Calendar annotation failed");
        }

        self.retire(event_id, true);
        info!(event_id = %event_id, tx_ref = %tx_ref, "Transaction executed");

        let owner = self.wallet.address(&self.namespace);
        if let Err(e) = self
            .recorder
            .update_intent_status(&owner, event_id, ScheduledStatus::Completed)
            .await
        {
            warn!(event_id = %event_id, error = %e, "Intent status update failed");
        }
    }

    /// Terminal failure: annotate, remember, drop, bump failure counter.
    async fn finalize_failure(&self, event_id: &str, attempts: u32, reason: &str) {
        let note = format!("{} after {} attempts: {}", FAILED_MARKER, attempts, reason);
        if let Err(e) = self.calendar.append_description(event_id, &note).await {
            warn!(event_id = %event_id, error = %e, "Calendar annotation failed");
        }

        self.retire(event_id, false);
        error!(event_id = %event_id, attempts, reason = %reason, "Transaction permanently failed");

        let owner = self.wallet.address(&self.namespace);
        if let Err(e) = self
            .recorder
            .update_intent_status(&owner, event_id, ScheduledStatus::Failed)
            .await
        {
            warn!(event_id = %event_id, error = %e, "Intent status update failed");
        }
    }

    fn retire(&self, event_id: &str, success: bool) {
        let mut state = self.state.write();
        state.processed.insert(event_id.to_string());
        state.queue.retain(|e| e.intent.source_event_id != event_id);
        if success {
            state.stats.transactions_executed += 1;
        } else {
            state.stats.transactions_failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Clock, SimulatedClock};
    use crate::executor::SimulatedSwap;
    use crate::gateway::memory::{MemoryCalendar, MemoryLedger, MemoryNetwork};
    use crate::gateway::{CalendarError, CalendarEvent, CalendarGateway};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    const NS: &str = "calendar-test";

    struct Fixture {
        scheduler: Arc<TransactionScheduler>,
        calendar: Arc<MemoryCalendar>,
        network: Arc<MemoryNetwork>,
        ledger: Arc<MemoryLedger>,
        wallet: Arc<NamespaceWallet>,
        clock: Arc<SimulatedClock>,
    }

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (ctx, clock) = RuntimeContext::simulated(start);
        let calendar = Arc::new(MemoryCalendar::new());
        let network = Arc::new(MemoryNetwork::new());
        let ledger = Arc::new(MemoryLedger::new());
        let wallet = Arc::new(NamespaceWallet::new("secret".into(), network.clone()));
        let recorder = Arc::new(LedgerAuditRecorder::new(ledger.clone()));
        let executor = Arc::new(TransactionExecutor::new(
            wallet.clone(),
            recorder.clone(),
            Arc::new(SimulatedSwap::new(ctx.ids.clone())),
            ctx.clone(),
        ));
        let scheduler = Arc::new(TransactionScheduler::new(
            calendar.clone(),
            executor,
            recorder,
            wallet.clone(),
            NS.to_string(),
            SchedulerConfig::default(),
            ctx,
        ));
        Fixture {
            scheduler,
            calendar,
            network,
            ledger,
            wallet,
            clock,
        }
    }

    fn add_event(fx: &Fixture, id: &str, title: &str, offset_secs: i64) {
        fx.calendar.add_event(CalendarEvent {
            id: id.into(),
            title: title.into(),
            start_time: fx.clock.now() + Duration::seconds(offset_secs),
            description: String::new(),
        });
    }

    #[tokio::test]
    async fn detects_and_queues_future_swap() {
        let fx = fixture();
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 120);

        fx.scheduler.run_tick().await;

        let queue = fx.scheduler.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].event_id, "evt-1");
        assert_eq!(queue[0].kind, "SWAP");
        assert_eq!(queue[0].seconds_until_due, 120);

        let status = fx.scheduler.status();
        assert_eq!(status.stats.transactions_detected, 1);
        assert_eq!(status.stats.total_checks, 1);
        assert_eq!(status.stats.queue_size, 1);
    }

    #[tokio::test]
    async fn non_transaction_titles_are_never_queued() {
        let fx = fixture();
        add_event(&fx, "evt-1", "Lunch with Sam", 120);

        fx.scheduler.run_tick().await;

        assert!(fx.scheduler.queue().is_empty());
        assert_eq!(fx.scheduler.status().stats.transactions_detected, 0);
    }

    #[tokio::test]
    async fn done_marker_moves_event_straight_to_processed() {
        let fx = fixture();
        fx.calendar.add_event(CalendarEvent {
            id: "evt-1".into(),
            title: "Swap 1 ETH to USDC".into(),
            start_time: fx.clock.now() + Duration::seconds(60),
            description: format!("{}: tx 0xold", EXECUTED_MARKER),
        });

        fx.scheduler.run_tick().await;

        assert!(fx.scheduler.queue().is_empty());
        assert_eq!(fx.scheduler.status().stats.transactions_detected, 0);
    }

    #[tokio::test]
    async fn executes_due_swap_and_annotates_calendar() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 0);

        fx.scheduler.run_tick().await;

        let status = fx.scheduler.status();
        assert_eq!(status.stats.transactions_executed, 1);
        assert_eq!(status.stats.queue_size, 0);

        let event = fx.calendar.event("evt-1").unwrap();
        assert!(event.description.contains(EXECUTED_MARKER));
    }

    #[tokio::test]
    async fn event_that_started_between_ticks_is_still_executed() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        // Started 30s before this tick, within the grace buffer
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", -30);

        fx.scheduler.run_tick().await;

        let status = fx.scheduler.status();
        assert_eq!(status.stats.transactions_detected, 1);
        assert_eq!(status.stats.transactions_executed, 1);
    }

    #[tokio::test]
    async fn stale_event_beyond_grace_is_dropped() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", -120);

        fx.scheduler.run_tick().await;

        assert!(fx.scheduler.queue().is_empty());
        assert_eq!(fx.scheduler.status().stats.transactions_executed, 0);
    }

    #[tokio::test]
    async fn terminal_events_are_never_reprocessed() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 0);

        fx.scheduler.run_tick().await;
        fx.scheduler.run_tick().await;
        fx.scheduler.run_tick().await;

        let status = fx.scheduler.status();
        assert_eq!(status.stats.transactions_executed, 1);
        assert_eq!(status.stats.transactions_detected, 1);
    }

    #[tokio::test]
    async fn queued_entry_executes_once_due_time_arrives() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 90);

        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.status().stats.transactions_executed, 0);

        fx.clock.advance_secs(120);
        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.status().stats.transactions_executed, 1);
    }

    #[tokio::test]
    async fn bounded_retry_then_permanent_failure() {
        let fx = fixture();
        // No balance: every transfer attempt fails
        add_event(
            &fx,
            "evt-1",
            "Send 1 STT to 0x1111111111111111111111111111111111111111",
            0,
        );

        // Attempts 1 and 2: entry stays queued
        fx.scheduler.run_tick().await;
        fx.scheduler.run_tick().await;
        let queue = fx.scheduler.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].attempts, 2);
        assert_eq!(fx.scheduler.status().stats.transactions_failed, 0);

        // Attempt 3 reaches the bound: finalized in the same tick
        fx.scheduler.run_tick().await;
        let status = fx.scheduler.status();
        assert_eq!(status.stats.transactions_failed, 1);
        assert_eq!(status.stats.queue_size, 0);

        let event = fx.calendar.event("evt-1").unwrap();
        assert!(event.description.contains(FAILED_MARKER));

        // Terminal: further ticks change nothing
        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.status().stats.transactions_failed, 1);
    }

    #[tokio::test]
    async fn scheduled_intent_lifecycle_reaches_completed() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 0);

        fx.scheduler.run_tick().await;

        let recorder = LedgerAuditRecorder::new(fx.ledger.clone());
        let owner = fx.wallet.address(NS);
        let record = recorder
            .get_scheduled_intent(&owner, "evt-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ScheduledStatus::Completed);
    }

    #[tokio::test]
    async fn clear_processed_cache_allows_reprocessing() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 0);

        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.status().stats.transactions_executed, 1);

        let cleared = fx.scheduler.clear_processed_cache();
        assert_eq!(cleared, 1);

        // The annotation now carries a done marker, so the event is
        // re-skipped rather than re-executed.
        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.status().stats.transactions_executed, 1);
    }

    #[tokio::test]
    async fn start_refused_when_calendar_unauthenticated() {
        let fx = fixture();
        fx.calendar.set_authenticated(false);

        let result = fx.scheduler.start().await;
        assert!(matches!(result, Err(SchedulerError::NotAuthenticated)));
        assert!(!fx.scheduler.status().running);
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let fx = fixture();
        assert!(matches!(
            fx.scheduler.stop(),
            Err(SchedulerError::NotRunning)
        ));
    }

    /// Auth probe that yields before answering, so concurrent starts
    /// overlap across the await point.
    struct SlowAuthCalendar(MemoryCalendar);

    #[async_trait::async_trait]
    impl CalendarGateway for SlowAuthCalendar {
        async fn is_authenticated(&self) -> bool {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.is_authenticated().await
        }

        async fn events_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            self.0.events_between(start, end).await
        }

        async fn append_description(
            &self,
            event_id: &str,
            text: &str,
        ) -> Result<(), CalendarError> {
            self.0.append_description(event_id, text).await
        }
    }

    #[tokio::test]
    async fn concurrent_starts_admit_exactly_one_loop() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (ctx, _clock) = RuntimeContext::simulated(start);
        let network = Arc::new(MemoryNetwork::new());
        let wallet = Arc::new(NamespaceWallet::new("secret".into(), network.clone()));
        let recorder = Arc::new(LedgerAuditRecorder::new(Arc::new(MemoryLedger::new())));
        let executor = Arc::new(TransactionExecutor::new(
            wallet.clone(),
            recorder.clone(),
            Arc::new(SimulatedSwap::new(ctx.ids.clone())),
            ctx.clone(),
        ));
        let scheduler = Arc::new(TransactionScheduler::new(
            Arc::new(SlowAuthCalendar(MemoryCalendar::new())),
            executor,
            recorder,
            wallet,
            NS.to_string(),
            SchedulerConfig::default(),
            ctx,
        ));

        let (a, b) = tokio::join!(scheduler.start(), scheduler.start());
        assert_eq!(
            a.is_ok() as usize + b.is_ok() as usize,
            1,
            "exactly one start may win"
        );
        assert!(scheduler.status().running);
        scheduler.stop().unwrap();
    }

    #[tokio::test]
    async fn start_stop_round_trip() {
        let fx = fixture();
        fx.scheduler.start().await.unwrap();
        assert!(fx.scheduler.status().running);
        assert!(matches!(
            fx.scheduler.start().await,
            Err(SchedulerError::AlreadyRunning)
        ));

        fx.scheduler.stop().unwrap();
        assert!(!fx.scheduler.status().running);
    }

    #[tokio::test]
    async fn calendar_fetch_failure_leaves_queue_intact() {
        let fx = fixture();
        fx.network.seed_balance(&fx.wallet.address(NS), dec!(10));
        add_event(&fx, "evt-1", "Swap 0.1 ETH to USDC", 300);
        fx.scheduler.run_tick().await;
        assert_eq!(fx.scheduler.queue().len(), 1);

        fx.calendar.set_authenticated(false);
        fx.scheduler.run_tick().await;

        // Fetch failed but the tick still completed and stats advanced
        let status = fx.scheduler.status();
        assert_eq!(status.stats.total_checks, 2);
        assert_eq!(fx.scheduler.queue().len(), 1);
    }
}
