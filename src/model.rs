use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    #[serde(rename = "SWAP")]
    Swap,
    #[serde(rename = "TRANSFER")]
    Transfer,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Swap => "SWAP",
            IntentKind::Transfer => "TRANSFER",
            IntentKind::Unknown => "UNKNOWN",
        }
    }
}

/// A structured intent extracted from one calendar event.
/// Immutable once produced; the same title + start time always parses
/// to the same intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub valid: bool,
    pub kind: IntentKind,
    pub from_asset: String,
    /// Destination asset symbol for `Swap`, destination hex address for
    /// `Transfer`. The distinction is carried by `kind`.
    pub to_target: String,
    /// Literal numeric substring from the title, kept verbatim.
    pub amount: String,
    pub due_at: DateTime<Utc>,
    pub source_event_id: String,
    pub source_title: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ParsedIntent {
    pub fn unknown(event_id: &str, title: &str, due_at: DateTime<Utc>, error: String) -> Self {
        Self {
            valid: false,
            kind: IntentKind::Unknown,
            from_asset: String::new(),
            to_target: String::new(),
            amount: String::new(),
            due_at,
            source_event_id: event_id.to_string(),
            source_title: title.to_string(),
            error: Some(error),
        }
    }
}

/// One pending transaction awaiting its due time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEntry {
    pub intent: ParsedIntent,
    pub namespace: String,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub chain_tx_ref: Option<String>,
    pub amount_received: Option<Decimal>,
    pub error: Option<String>,
    /// Ledger ref of the audit append, empty when the append failed.
    /// Audit failures never affect `success`.
    pub audit_ref: Option<String>,
}

/// Outcome of asking the executor to run one intent.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The intent's due time has not arrived. Not an error; try again
    /// on a later tick.
    NotDue { seconds_until_due: i64 },
    Done(ExecutionResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "EXECUTED")]
    Executed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduledStatus {
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "EXECUTING")]
    Executing,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "EXPIRED")]
    Expired,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Immutable audit entry for one executed (or failed) transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub id: String,
    pub owner_address: String,
    pub namespace: String,
    pub source_event_id: String,
    pub kind: IntentKind,
    pub from_asset: String,
    pub to_asset: String,
    pub amount: Decimal,
    #[serde(default)]
    pub amount_received: Option<Decimal>,
    #[serde(default)]
    pub chain_tx_ref: Option<String>,
    pub status: TxStatus,
    pub notes: String,
}

/// A pre-announced commitment: "this namespace will do X at time T".
/// The ledger is append-only, so status changes are expressed by
/// re-appending under the same intent id; current state is the latest
/// record for that id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledIntentRecord {
    pub scheduled_time: DateTime<Utc>,
    pub intent_id: String,
    pub owner_address: String,
    pub kind: IntentKind,
    pub from_asset: String,
    pub to_asset: String,
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: ScheduledStatus,
}

/// Aggregated per-owner counters, maintained read-then-append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatsRecord {
    pub owner_address: String,
    pub total_tx: u64,
    pub success_tx: u64,
    pub failed_tx: u64,
    pub total_volume: Decimal,
    pub first_activity_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub most_used_kind: String,
}

impl UserStatsRecord {
    pub fn success_rate(&self) -> f64 {
        if self.total_tx == 0 {
            return 0.0;
        }
        self.success_tx as f64 / self.total_tx as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReputationTier {
    #[serde(rename = "NEWCOMER")]
    Newcomer,
    #[serde(rename = "RISING_STAR")]
    RisingStar,
    #[serde(rename = "ACTIVE_TRADER")]
    ActiveTrader,
    #[serde(rename = "DIAMOND_HANDS")]
    DiamondHands,
    /// Default low-trust tier when no other bracket applies.
    #[serde(rename = "UNRANKED")]
    Unranked,
}

/// Binds an intent to its on-chain outcome. `verification_hash` is a
/// one-way digest of `(intent_id, chain_tx_ref, actual_amount)` that can
/// be recomputed downstream to detect tampering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionProofRecord {
    pub proof_id: String,
    pub intent_id: String,
    pub chain_tx_ref: String,
    pub scheduled_time: DateTime<Utc>,
    pub actual_time: DateTime<Utc>,
    pub time_delta_seconds: i64,
    pub status: TxStatus,
    pub expected_amount: Decimal,
    pub actual_amount: Decimal,
    pub verification_hash: String,
}
