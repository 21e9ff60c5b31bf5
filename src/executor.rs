//! Turns one parsed intent into an execution result.
//!
//! Dispatch is an exhaustive match on the intent kind: swaps go through
//! the pluggable `SwapStrategy`, transfers through the namespace wallet.
//! Audit recording is best-effort and never changes the execution
//! outcome.

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::{IdGen, RuntimeContext};
use crate::model::{
    ExecutionOutcome, ExecutionProofRecord, ExecutionResult, IntentKind, ParsedIntent,
    TransactionAuditRecord, TxStatus,
};
use crate::recorder::{compute_verification_hash, LedgerAuditRecorder};
use crate::wallet::{NamespaceWallet, WalletError};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },
    #[error("Swap failed: {0}")]
    Swap(String),
    #[error("Intent is not executable: {0}")]
    Unexecutable(String),
    #[error("Invalid amount \"{0}\"")]
    InvalidAmount(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

#[derive(Debug, Clone)]
pub struct SwapFill {
    pub amount_received: Decimal,
    pub chain_tx_ref: String,
}

/// Seam for the swap venue. The shipped implementation is a simulation;
/// a real exchange integration slots in here without touching the
/// scheduler or executor.
#[async_trait]
pub trait SwapStrategy: Send + Sync {
    async fn execute_swap(
        &self,
        namespace: &str,
        from_asset: &str,
        to_asset: &str,
        amount: Decimal,
    ) -> Result<SwapFill, ExecutionError>;

    fn name(&self) -> &str;
}

/// Placeholder exchange model: the fill is a deterministic function of
/// the input amount and the destination asset. Not a real DEX.
pub struct SimulatedSwap {
    ids: Arc<dyn IdGen>,
}

impl SimulatedSwap {
    pub fn new(ids: Arc<dyn IdGen>) -> Self {
        Self { ids }
    }

    fn placeholder_rate(to_asset: &str) -> Decimal {
        match to_asset {
            "USDC" | "USDT" | "DAI" => dec!(2500),
            "BTC" => dec!(0.05),
            "ETH" => dec!(1.2),
            _ => dec!(1),
        }
    }
}

#[async_trait]
impl SwapStrategy for SimulatedSwap {
    async fn execute_swap(
        &self,
        _namespace: &str,
        from_asset: &str,
        to_asset: &str,
        amount: Decimal,
    ) -> Result<SwapFill, ExecutionError> {
        let amount_received = amount * Self::placeholder_rate(to_asset);
        let chain_tx_ref = format!("sim-{}", self.ids.new_id());
        info!(
            from = %from_asset,
            to = %to_asset,
            amount = %amount,
            received = %amount_received,
            tx_ref = %chain_tx_ref,
            "Simulated swap fill"
        );
        Ok(SwapFill {
            amount_received,
            chain_tx_ref,
        })
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

pub struct TransactionExecutor {
    wallet: Arc<NamespaceWallet>,
    recorder: Arc<LedgerAuditRecorder>,
    swap_strategy: Arc<dyn SwapStrategy>,
    ctx: RuntimeContext,
}

impl TransactionExecutor {
    pub fn new(
        wallet: Arc<NamespaceWallet>,
        recorder: Arc<LedgerAuditRecorder>,
        swap_strategy: Arc<dyn SwapStrategy>,
        ctx: RuntimeContext,
    ) -> Self {
        Self {
            wallet,
            recorder,
            swap_strategy,
            ctx,
        }
    }

    /// Execute one intent for a namespace. Refuses intents whose due
    /// time has not arrived; every other path yields a `Done` result
    /// (success or failure), never a panic.
    pub async fn execute(&self, intent: &ParsedIntent, namespace: &str) -> ExecutionOutcome {
        let now = self.ctx.clock.now();
        if intent.due_at > now {
            let seconds_until_due = (intent.due_at - now).num_seconds();
            return ExecutionOutcome::NotDue { seconds_until_due };
        }

        let attempt = self.run(intent, namespace).await;
        let (success, chain_tx_ref, amount_received, error) = match attempt {
            Ok((tx_ref, received)) => (true, Some(tx_ref), Some(received), None),
            Err(e) => (false, None, None, Some(e.to_string())),
        };

        let audit_ref = self
            .record_outcome(intent, namespace, success, &chain_tx_ref, amount_received, &error)
            .await;

        ExecutionOutcome::Done(ExecutionResult {
            success,
            chain_tx_ref,
            amount_received,
            error,
            audit_ref,
        })
    }

    async fn run(
        &self,
        intent: &ParsedIntent,
        namespace: &str,
    ) -> Result<(String, Decimal), ExecutionError> {
        let amount = Decimal::from_str(&intent.amount)
            .map_err(|_| ExecutionError::InvalidAmount(intent.amount.clone()))?;

        match intent.kind {
            IntentKind::Swap => {
                let available = self.wallet.balance(namespace).await?;
                if available < amount {
                    return Err(ExecutionError::InsufficientBalance {
                        available,
                        required: amount,
                    });
                }
                let fill = self
                    .swap_strategy
                    .execute_swap(namespace, &intent.from_asset, &intent.to_target, amount)
                    .await?;
                Ok((fill.chain_tx_ref, fill.amount_received))
            }
            IntentKind::Transfer => {
                let tx_ref = self
                    .wallet
                    .send(namespace, &intent.to_target, amount)
                    .await?;
                Ok((tx_ref, amount))
            }
            IntentKind::Unknown => Err(ExecutionError::Unexecutable(
                "unknown intents never reach the executor".to_string(),
            )),
        }
    }

    /// Append audit, stats and proof records. Any ledger failure here is
    /// logged and swallowed; the execution result stands on its own.
    async fn record_outcome(
        &self,
        intent: &ParsedIntent,
        namespace: &str,
        success: bool,
        chain_tx_ref: &Option<String>,
        amount_received: Option<Decimal>,
        error: &Option<String>,
    ) -> Option<String> {
        let now = self.ctx.clock.now();
        let owner = self.wallet.address(namespace);
        let amount = Decimal::from_str(&intent.amount).unwrap_or(Decimal::ZERO);

        let audit = TransactionAuditRecord {
            timestamp: now,
            id: self.ctx.ids.new_id(),
            owner_address: owner.clone(),
            namespace: namespace.to_string(),
            source_event_id: intent.source_event_id.clone(),
            kind: intent.kind,
            from_asset: intent.from_asset.clone(),
            to_asset: intent.to_target.clone(),
            amount,
            amount_received,
            chain_tx_ref: chain_tx_ref.clone(),
            status: if success {
                TxStatus::Executed
            } else {
                TxStatus::Failed
            },
            notes: error.clone().unwrap_or_default(),
        };

        let audit_ref = match self.recorder.record_transaction(&audit).await {
            Ok(ledger_ref) => Some(ledger_ref),
            Err(e) => {
                warn!(event_id = %intent.source_event_id, error = %e, "Audit append failed; execution result unaffected");
                None
            }
        };

        if let Err(e) = self
            .recorder
            .record_activity(&owner, intent.kind, amount, success, now)
            .await
        {
            warn!(owner = %owner, error = %e, "Stats append failed");
        }

        if let (true, Some(tx_ref)) = (success, chain_tx_ref.as_ref()) {
            let actual_amount = amount_received.unwrap_or(amount);
            let proof = ExecutionProofRecord {
                proof_id: format!("proof-{}", intent.source_event_id),
                intent_id: intent.source_event_id.clone(),
                chain_tx_ref: tx_ref.clone(),
                scheduled_time: intent.due_at,
                actual_time: now,
                time_delta_seconds: (now - intent.due_at).num_seconds(),
                status: TxStatus::Executed,
                expected_amount: amount,
                actual_amount,
                verification_hash: compute_verification_hash(
                    &intent.source_event_id,
                    tx_ref,
                    actual_amount,
                ),
            };
            if let Err(e) = self.recorder.record_execution_proof(&owner, &proof).await {
                warn!(intent_id = %proof.intent_id, error = %e, "Proof append failed");
            }
        }

        audit_ref
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Clock;
    use crate::gateway::memory::{MemoryLedger, MemoryNetwork};
    use crate::intent_parser::parse_event;
    use crate::recorder::ON_TIME_WINDOW_SECS;
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        executor: TransactionExecutor,
        network: Arc<MemoryNetwork>,
        ledger: Arc<MemoryLedger>,
        recorder: Arc<LedgerAuditRecorder>,
        wallet: Arc<NamespaceWallet>,
        clock: Arc<crate::context::SimulatedClock>,
    }

    fn fixture() -> Fixture {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (ctx, clock) = RuntimeContext::simulated(start);
        let network = Arc::new(MemoryNetwork::new());
        let ledger = Arc::new(MemoryLedger::new());
        let wallet = Arc::new(NamespaceWallet::new("secret".into(), network.clone()));
        let recorder = Arc::new(LedgerAuditRecorder::new(ledger.clone()));
        let swap = Arc::new(SimulatedSwap::new(ctx.ids.clone()));
        let executor = TransactionExecutor::new(
            wallet.clone(),
            recorder.clone(),
            swap,
            ctx,
        );
        Fixture {
            executor,
            network,
            ledger,
            recorder,
            wallet,
            clock,
        }
    }

    fn due_intent(fx: &Fixture, title: &str) -> ParsedIntent {
        parse_event("evt-1", title, fx.clock.now())
    }

    #[tokio::test]
    async fn refuses_intent_that_is_not_due() {
        let fx = fixture();
        let intent = parse_event(
            "evt-1",
            "Swap 1 ETH to USDC",
            fx.clock.now() + Duration::minutes(5),
        );
        match fx.executor.execute(&intent, "ns").await {
            ExecutionOutcome::NotDue { seconds_until_due } => {
                assert_eq!(seconds_until_due, 300);
            }
            other => panic!("expected NotDue, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn simulated_swap_fills_deterministically() {
        // Simulated, not real execution: the fill comes from the fixed
        // placeholder rate table, not a live venue.
        let fx = fixture();
        fx.network
            .seed_balance(&fx.wallet.address("ns"), dec!(10));
        let intent = due_intent(&fx, "Swap 0.1 ETH to USDC");

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(result.success);
        assert_eq!(result.amount_received, Some(dec!(250)));
        assert!(result.chain_tx_ref.unwrap().starts_with("sim-"));
        assert!(result.audit_ref.is_some());
    }

    #[tokio::test]
    async fn swap_fails_on_insufficient_balance() {
        let fx = fixture();
        // No balance seeded
        let intent = due_intent(&fx, "Swap 0.1 ETH to USDC");

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn transfer_delegates_to_wallet() {
        let fx = fixture();
        fx.network
            .seed_balance(&fx.wallet.address("ns"), dec!(5));
        let intent = due_intent(
            &fx,
            "Send 1 STT to 0x1111111111111111111111111111111111111111",
        );

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(result.success);
        assert_eq!(result.amount_received, Some(dec!(1)));
        assert_eq!(fx.wallet.balance("ns").await.unwrap(), dec!(4));
    }

    #[tokio::test]
    async fn audit_append_failure_never_flips_success() {
        let fx = fixture();
        fx.network
            .seed_balance(&fx.wallet.address("ns"), dec!(10));
        fx.ledger.set_fail_appends(true);
        let intent = due_intent(&fx, "Swap 1 ETH to USDC");

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(result.success);
        assert!(result.audit_ref.is_none());
    }

    #[tokio::test]
    async fn successful_execution_leaves_verifiable_proof() {
        let fx = fixture();
        fx.network
            .seed_balance(&fx.wallet.address("ns"), dec!(10));
        let intent = due_intent(&fx, "Swap 1 ETH to USDC");
        fx.clock.advance_secs(10);

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(result.success);

        let owner = fx.wallet.address("ns");
        let verification = fx
            .recorder
            .verify_proof(&owner, "evt-1", ON_TIME_WINDOW_SECS)
            .await
            .unwrap()
            .unwrap();
        assert!(verification.hash_valid);
        assert!(verification.on_time);
        assert_eq!(verification.time_delta_seconds, 10);
    }

    #[tokio::test]
    async fn failed_execution_still_appends_failed_audit() {
        let fx = fixture();
        let intent = due_intent(&fx, "Swap 1 ETH to USDC");

        let ExecutionOutcome::Done(result) = fx.executor.execute(&intent, "ns").await else {
            panic!("expected Done");
        };
        assert!(!result.success);

        let owner = fx.wallet.address("ns");
        let stats = fx.recorder.get_user_stats(&owner).await.unwrap().unwrap();
        assert_eq!(stats.failed_tx, 1);
        assert_eq!(stats.total_volume, Decimal::ZERO);
    }
}
