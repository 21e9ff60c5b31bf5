use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod memory;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar not authenticated")]
    NotAuthenticated,
    #[error("Calendar API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Broadcast rejected: {0}")]
    Rejected(String),
    #[error("Unknown address: {0}")]
    UnknownAddress(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger append failed: {0}")]
    Append(String),
    #[error("Ledger read failed: {0}")]
    Read(String),
    #[error("Payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One event read from the calendar source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

/// The calendar source the scheduler polls. Mirrors the minimal surface
/// the engine needs: auth probe, windowed fetch, and result annotation.
#[async_trait]
pub trait CalendarGateway: Send + Sync {
    async fn is_authenticated(&self) -> bool;

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// Append `text` to the event's description, preserving what is
    /// already there.
    async fn append_description(&self, event_id: &str, text: &str) -> Result<(), CalendarError>;
}

/// The value-transfer network. Signing happens in the wallet; the
/// gateway only checks balances and broadcasts signed transfers.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<Decimal, NetworkError>;

    /// Broadcast a transfer and block until the network confirms or
    /// errors. Returns the chain tx ref.
    async fn broadcast_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        signature: &str,
    ) -> Result<String, NetworkError>;
}

/// Record schemas recognised by the append-only ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    #[serde(rename = "transaction_audit")]
    TransactionAudit,
    #[serde(rename = "scheduled_intent")]
    ScheduledIntent,
    #[serde(rename = "user_stats")]
    UserStats,
    #[serde(rename = "execution_proof")]
    ExecutionProof,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::TransactionAudit => "transaction_audit",
            SchemaKind::ScheduledIntent => "scheduled_intent",
            SchemaKind::UserStats => "user_stats",
            SchemaKind::ExecutionProof => "execution_proof",
        }
    }
}

/// Append-only, key-addressable record store. Records never mutate;
/// "current" state for a record id is the latest append under that id.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Append a payload under `(schema, owner, record_id)`. Returns the
    /// ledger tx ref of the append.
    async fn append(
        &self,
        schema: SchemaKind,
        owner: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<String, LedgerError>;

    /// Latest payload for an exact key, or None if never appended.
    async fn get_by_key(
        &self,
        schema: SchemaKind,
        owner: &str,
        record_id: &str,
    ) -> Result<Option<Value>, LedgerError>;

    /// Latest payload of every record id the owner has under `schema`.
    async fn get_all_by_owner(
        &self,
        schema: SchemaKind,
        owner: &str,
    ) -> Result<Vec<Value>, LedgerError>;
}
