//! Appends the engine's audit trail to the external append-only ledger.
//!
//! Four record kinds, each appended under a deterministic record id
//! derived from its natural key: audit records under the source event id,
//! scheduled intents and execution proofs under the intent id, stats
//! snapshots under the owner address.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;

use crate::gateway::{LedgerError, LedgerGateway, SchemaKind};
use crate::model::{
    ExecutionProofRecord, IntentKind, ReputationTier, ScheduledIntentRecord, ScheduledStatus,
    TransactionAuditRecord, UserStatsRecord,
};

/// Default tolerance for calling an execution "on time".
pub const ON_TIME_WINDOW_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize)]
pub struct ProofVerification {
    pub hash_valid: bool,
    pub on_time: bool,
    pub time_delta_seconds: i64,
}

pub struct LedgerAuditRecorder {
    ledger: Arc<dyn LedgerGateway>,
}

impl LedgerAuditRecorder {
    pub fn new(ledger: Arc<dyn LedgerGateway>) -> Self {
        Self { ledger }
    }

    /// Append an executed-transaction audit record.
    pub async fn record_transaction(
        &self,
        record: &TransactionAuditRecord,
    ) -> Result<String, LedgerError> {
        let payload = serde_json::to_value(record)?;
        let ledger_ref = self
            .ledger
            .append(
                SchemaKind::TransactionAudit,
                &record.owner_address,
                &record.source_event_id,
                payload,
            )
            .await?;
        info!(
            event_id = %record.source_event_id,
            status = ?record.status,
            ledger_ref = %ledger_ref,
            "Audit record appended"
        );
        Ok(ledger_ref)
    }

    /// Pre-announce a scheduled intent.
    pub async fn record_scheduled_intent(
        &self,
        record: &ScheduledIntentRecord,
    ) -> Result<String, LedgerError> {
        let payload = serde_json::to_value(record)?;
        self.ledger
            .append(
                SchemaKind::ScheduledIntent,
                &record.owner_address,
                &record.intent_id,
                payload,
            )
            .await
    }

    /// Latest state of a scheduled intent.
    pub async fn get_scheduled_intent(
        &self,
        owner: &str,
        intent_id: &str,
    ) -> Result<Option<ScheduledIntentRecord>, LedgerError> {
        let payload = self
            .ledger
            .get_by_key(SchemaKind::ScheduledIntent, owner, intent_id)
            .await?;
        payload
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Move a scheduled intent to a new status by re-appending under the
    /// same intent id. Returns None if the intent was never announced.
    pub async fn update_intent_status(
        &self,
        owner: &str,
        intent_id: &str,
        status: ScheduledStatus,
    ) -> Result<Option<String>, LedgerError> {
        let Some(mut record) = self.get_scheduled_intent(owner, intent_id).await? else {
            return Ok(None);
        };
        record.status = status;
        let ledger_ref = self.record_scheduled_intent(&record).await?;
        Ok(Some(ledger_ref))
    }

    /// Latest stats snapshot for an owner.
    pub async fn get_user_stats(
        &self,
        owner: &str,
    ) -> Result<Option<UserStatsRecord>, LedgerError> {
        let payload = self
            .ledger
            .get_by_key(SchemaKind::UserStats, owner, owner)
            .await?;
        payload
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Fold one completed execution into the owner's stats snapshot.
    ///
    /// Read-then-append, last-writer-wins: two overlapping updates for
    /// the same owner can lose an increment. Within one scheduler this
    /// cannot happen (due items run sequentially); multiple scheduler
    /// instances against the same owner are a known gap.
    pub async fn record_activity(
        &self,
        owner: &str,
        kind: IntentKind,
        amount: Decimal,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<String, LedgerError> {
        let mut stats = self
            .get_user_stats(owner)
            .await?
            .unwrap_or(UserStatsRecord {
                owner_address: owner.to_string(),
                total_tx: 0,
                success_tx: 0,
                failed_tx: 0,
                total_volume: Decimal::ZERO,
                first_activity_at: now,
                last_activity_at: now,
                most_used_kind: kind.as_str().to_string(),
            });

        stats.total_tx += 1;
        if success {
            stats.success_tx += 1;
            stats.total_volume += amount;
        } else {
            stats.failed_tx += 1;
        }
        stats.last_activity_at = now;
        stats.most_used_kind = self.most_used_kind(owner).await.unwrap_or(kind).as_str().to_string();

        let payload = serde_json::to_value(&stats)?;
        self.ledger
            .append(SchemaKind::UserStats, owner, owner, payload)
            .await
    }

    /// Dominant intent kind across the owner's audit records.
    async fn most_used_kind(&self, owner: &str) -> Option<IntentKind> {
        let records = self
            .ledger
            .get_all_by_owner(SchemaKind::TransactionAudit, owner)
            .await
            .ok()?;
        let mut swaps = 0usize;
        let mut transfers = 0usize;
        for payload in &records {
            match serde_json::from_value::<TransactionAuditRecord>(payload.clone()) {
                Ok(r) if r.kind == IntentKind::Swap => swaps += 1,
                Ok(r) if r.kind == IntentKind::Transfer => transfers += 1,
                _ => {}
            }
        }
        if swaps == 0 && transfers == 0 {
            None
        } else if transfers > swaps {
            Some(IntentKind::Transfer)
        } else {
            Some(IntentKind::Swap)
        }
    }

    /// Append an execution proof.
    pub async fn record_execution_proof(
        &self,
        owner: &str,
        record: &ExecutionProofRecord,
    ) -> Result<String, LedgerError> {
        let payload = serde_json::to_value(record)?;
        self.ledger
            .append(SchemaKind::ExecutionProof, owner, &record.intent_id, payload)
            .await
    }

    pub async fn get_execution_proof(
        &self,
        owner: &str,
        intent_id: &str,
    ) -> Result<Option<ExecutionProofRecord>, LedgerError> {
        let payload = self
            .ledger
            .get_by_key(SchemaKind::ExecutionProof, owner, intent_id)
            .await?;
        payload
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Recompute the verification hash of a stored proof and check the
    /// schedule adherence window.
    pub async fn verify_proof(
        &self,
        owner: &str,
        intent_id: &str,
        window_secs: i64,
    ) -> Result<Option<ProofVerification>, LedgerError> {
        let Some(proof) = self.get_execution_proof(owner, intent_id).await? else {
            return Ok(None);
        };
        let expected = compute_verification_hash(
            &proof.intent_id,
            &proof.chain_tx_ref,
            proof.actual_amount,
        );
        Ok(Some(ProofVerification {
            hash_valid: expected == proof.verification_hash,
            on_time: is_on_time(proof.time_delta_seconds, window_secs),
            time_delta_seconds: proof.time_delta_seconds,
        }))
    }
}

/// One-way binding of an intent to its chain outcome. The amount is
/// scale-normalized (`250.0` and `250` hash identically) so the hash
/// survives serialization round trips that do not preserve scale.
pub fn compute_verification_hash(
    intent_id: &str,
    chain_tx_ref: &str,
    actual_amount: Decimal,
) -> String {
    let canonical = format!("{}.{}.{}", intent_id, chain_tx_ref, actual_amount.normalize());
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

pub fn is_on_time(time_delta_seconds: i64, window_secs: i64) -> bool {
    time_delta_seconds.abs() <= window_secs
}

/// Coarse trust label from an owner's aggregate counters.
pub fn reputation_tier(stats: &UserStatsRecord) -> ReputationTier {
    let total = stats.total_tx;
    let rate = stats.success_rate();
    if total < 5 {
        ReputationTier::Newcomer
    } else if total < 20 && rate > 0.80 {
        ReputationTier::RisingStar
    } else if total < 50 && rate > 0.90 {
        ReputationTier::ActiveTrader
    } else if total >= 50 && rate > 0.95 {
        ReputationTier::DiamondHands
    } else {
        ReputationTier::Unranked
    }
}
