//! In-process gateway implementations.
//!
//! These back the default wiring in `main` and the test suite. They keep
//! the same contracts as real integrations (append-only ledger, balance
//! bookkeeping on transfers, auth probe on the calendar) and expose
//! failure injection switches so error paths can be exercised.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

use super::{
    CalendarError, CalendarEvent, CalendarGateway, LedgerError, LedgerGateway, NetworkError,
    NetworkGateway, SchemaKind,
};

#[derive(Default)]
pub struct MemoryCalendar {
    events: RwLock<Vec<CalendarEvent>>,
    authenticated: AtomicBool,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            authenticated: AtomicBool::new(true),
        }
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    pub fn add_event(&self, event: CalendarEvent) {
        self.events.write().push(event);
    }

    pub fn event(&self, event_id: &str) -> Option<CalendarEvent> {
        self.events.read().iter().find(|e| e.id == event_id).cloned()
    }
}

#[async_trait]
impl CalendarGateway for MemoryCalendar {
    async fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(CalendarError::NotAuthenticated);
        }
        let events = self
            .events
            .read()
            .iter()
            .filter(|e| e.start_time >= start && e.start_time <= end)
            .cloned()
            .collect();
        Ok(events)
    }

    async fn append_description(&self, event_id: &str, text: &str) -> Result<(), CalendarError> {
        let mut events = self.events.write();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| CalendarError::Api(format!("No such event: {}", event_id)))?;
        if !event.description.is_empty() {
            event.description.push('\n');
        }
        event.description.push_str(text);
        Ok(())
    }
}

pub struct MemoryNetwork {
    balances: DashMap<String, Decimal>,
    tx_counter: AtomicU64,
    fail_broadcasts: AtomicBool,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self {
            balances: DashMap::new(),
            tx_counter: AtomicU64::new(0),
            fail_broadcasts: AtomicBool::new(false),
        }
    }

    pub fn seed_balance(&self, address: &str, amount: Decimal) {
        self.balances.insert(address.to_string(), amount);
    }

    /// Force every broadcast to fail with an RPC error.
    pub fn set_fail_broadcasts(&self, value: bool) {
        self.fail_broadcasts.store(value, Ordering::SeqCst);
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkGateway for MemoryNetwork {
    async fn get_balance(&self, address: &str) -> Result<Decimal, NetworkError> {
        Ok(self
            .balances
            .get(address)
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO))
    }

    async fn broadcast_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Decimal,
        _signature: &str,
    ) -> Result<String, NetworkError> {
        if self.fail_broadcasts.load(Ordering::SeqCst) {
            return Err(NetworkError::Rpc("injected broadcast failure".into()));
        }

        let available = self
            .balances
            .get(from)
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO);
        if available < amount {
            return Err(NetworkError::Rejected(format!(
                "insufficient funds: {} < {}",
                available, amount
            )));
        }

        self.balances.insert(from.to_string(), available - amount);
        let credited = self
            .balances
            .get(to)
            .map(|b| *b)
            .unwrap_or(Decimal::ZERO);
        self.balances.insert(to.to_string(), credited + amount);

        let seq = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_ref = format!("0xmem{:016x}", seq);
        debug!(from = %from, to = %to, amount = %amount, tx_ref = %tx_ref, "Transfer settled");
        Ok(tx_ref)
    }
}

pub struct MemoryLedger {
    // (schema, owner, record_id) -> append history, oldest first
    records: DashMap<(SchemaKind, String, String), Vec<Value>>,
    tx_counter: AtomicU64,
    fail_appends: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            tx_counter: AtomicU64::new(0),
            fail_appends: AtomicBool::new(false),
        }
    }

    /// Force every append to fail. Reads stay functional.
    pub fn set_fail_appends(&self, value: bool) {
        self.fail_appends.store(value, Ordering::SeqCst);
    }

    /// Number of appends under one key, across re-appends.
    pub fn append_count(&self, schema: SchemaKind, owner: &str, record_id: &str) -> usize {
        self.records
            .get(&(schema, owner.to_string(), record_id.to_string()))
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn append(
        &self,
        schema: SchemaKind,
        owner: &str,
        record_id: &str,
        payload: Value,
    ) -> Result<String, LedgerError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(LedgerError::Append("injected append failure".into()));
        }
        self.records
            .entry((schema, owner.to_string(), record_id.to_string()))
            .or_default()
            .push(payload);
        let seq = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("ledger-{:016x}", seq))
    }

    async fn get_by_key(
        &self,
        schema: SchemaKind,
        owner: &str,
        record_id: &str,
    ) -> Result<Option<Value>, LedgerError> {
        Ok(self
            .records
            .get(&(schema, owner.to_string(), record_id.to_string()))
            .and_then(|h| h.last().cloned()))
    }

    async fn get_all_by_owner(
        &self,
        schema: SchemaKind,
        owner: &str,
    ) -> Result<Vec<Value>, LedgerError> {
        let mut out = Vec::new();
        for entry in self.records.iter() {
            let (s, o, _) = entry.key();
            if *s == schema && o == owner {
                if let Some(latest) = entry.value().last() {
                    out.push(latest.clone());
                }
            }
        }
        Ok(out)
    }
}
