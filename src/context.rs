use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Source of the current time. Scheduling decisions ("is this intent
/// due?") go through this trait so tests can drive a simulated clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of unique identifiers for synthetic tx refs and proof ids.
pub trait IdGen: Send + Sync {
    fn new_id(&self) -> String;
}

/// Bundles the clock and id generator, passed down to the executor,
/// recorder and scheduler.
#[derive(Clone)]
pub struct RuntimeContext {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGen>,
}

impl RuntimeContext {
    pub fn system() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGen),
        }
    }

    /// Deterministic context for tests: fixed start time, sequential ids.
    pub fn simulated(start: DateTime<Utc>) -> (Self, Arc<SimulatedClock>) {
        let clock = Arc::new(SimulatedClock::new(start));
        let ctx = Self {
            clock: clock.clone(),
            ids: Arc::new(SequentialIdGen::new()),
        };
        (ctx, clock)
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct UuidGen;

impl IdGen for UuidGen {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

pub struct SimulatedClock {
    now_ms: AtomicI64,
}

impl SimulatedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.now_ms.store(time.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.now_ms.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms).unwrap()
    }
}

pub struct SequentialIdGen {
    counter: AtomicU64,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for SequentialIdGen {
    fn new_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("id-{:08x}", n)
    }
}
