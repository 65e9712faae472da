//! Frame pump counters

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    rate_limited: AtomicU64,
    busy_dropped: AtomicU64,
    stale_skipped: AtomicU64,
    submitted: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`PumpStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpSnapshot {
    pub ticks: u64,
    pub rate_limited: u64,
    pub busy_dropped: u64,
    pub stale_skipped: u64,
    pub submitted: u64,
    pub emitted: u64,
    pub failed: u64,
}

/// Lock-free counters, shared with whoever wants to watch the pump
#[derive(Default)]
pub struct PumpStats {
    counters: CachePadded<Counters>,
}

macro_rules! bump {
    ($fn:ident, $field:ident, $metric:literal) => {
        pub fn $fn(&self) {
            self.counters.$field.fetch_add(1, Ordering::Relaxed);
            metrics::counter!($metric).increment(1);
        }
    };
}

impl PumpStats {
    pub fn new() -> Self {
        Self::default()
    }

    bump!(tick, ticks, "pump_ticks_total");
    bump!(rate_limited, rate_limited, "pump_rate_limited_total");
    bump!(busy_dropped, busy_dropped, "pump_busy_dropped_total");
    bump!(stale_skipped, stale_skipped, "pump_stale_skipped_total");
    bump!(submitted, submitted, "pump_submitted_total");
    bump!(emitted, emitted, "pump_emitted_total");
    bump!(failed, failed, "pump_failed_total");

    pub fn snapshot(&self) -> PumpSnapshot {
        let c = &self.counters;
        PumpSnapshot {
            ticks: c.ticks.load(Ordering::Relaxed),
            rate_limited: c.rate_limited.load(Ordering::Relaxed),
            busy_dropped: c.busy_dropped.load(Ordering::Relaxed),
            stale_skipped: c.stale_skipped.load(Ordering::Relaxed),
            submitted: c.submitted.load(Ordering::Relaxed),
            emitted: c.emitted.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
        }
    }
}
