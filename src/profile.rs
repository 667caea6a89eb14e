//! Opt-in timing counters for the scan path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A snapshot of lookup profiling metrics.
///
/// Profiling is enabled via the `SOMBRA_PROFILE` environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupProfileSnapshot {
    /// Total nanoseconds spent iterating index entries.
    pub scan_ns: u64,
    /// Number of index entries visited.
    pub scan_count: u64,
    /// Total nanoseconds spent fetching base records.
    pub base_fetch_ns: u64,
    /// Number of base-record fetches.
    pub base_fetch_count: u64,
    /// Total nanoseconds spent in row-level qualification.
    pub qualify_ns: u64,
    /// Number of row-level qualification passes.
    pub qualify_count: u64,
}

#[derive(Default)]
struct LookupProfileCounters {
    scan_ns: AtomicU64,
    scan_count: AtomicU64,
    base_fetch_ns: AtomicU64,
    base_fetch_count: AtomicU64,
    qualify_ns: AtomicU64,
    qualify_count: AtomicU64,
}

static PROFILE_ENABLED: OnceLock<bool> = OnceLock::new();
static PROFILE_COUNTERS: OnceLock<LookupProfileCounters> = OnceLock::new();

fn profiling_enabled() -> bool {
    *PROFILE_ENABLED.get_or_init(|| std::env::var_os("SOMBRA_PROFILE").is_some())
}

fn counters() -> Option<&'static LookupProfileCounters> {
    profiling_enabled().then(|| PROFILE_COUNTERS.get_or_init(LookupProfileCounters::default))
}

fn timer_if(enabled: bool) -> Option<Instant> {
    enabled.then(Instant::now)
}

pub(crate) fn profile_timer() -> Option<Instant> {
    timer_if(profiling_enabled())
}

#[derive(Clone, Copy)]
pub(crate) enum LookupProfileKind {
    Scan,
    BaseFetch,
    Qualify,
}

impl LookupProfileCounters {
    fn record(&self, kind: LookupProfileKind, nanos: u64) {
        let (ns, count) = match kind {
            LookupProfileKind::Scan => (&self.scan_ns, &self.scan_count),
            LookupProfileKind::BaseFetch => (&self.base_fetch_ns, &self.base_fetch_count),
            LookupProfileKind::Qualify => (&self.qualify_ns, &self.qualify_count),
        };
        ns.fetch_add(nanos, Ordering::Relaxed);
        count.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, reset: bool) -> LookupProfileSnapshot {
        let load = |counter: &AtomicU64| {
            if reset {
                counter.swap(0, Ordering::Relaxed)
            } else {
                counter.load(Ordering::Relaxed)
            }
        };
        LookupProfileSnapshot {
            scan_ns: load(&self.scan_ns),
            scan_count: load(&self.scan_count),
            base_fetch_ns: load(&self.base_fetch_ns),
            base_fetch_count: load(&self.base_fetch_count),
            qualify_ns: load(&self.qualify_ns),
            qualify_count: load(&self.qualify_count),
        }
    }
}

fn record_into(
    counters: Option<&LookupProfileCounters>,
    kind: LookupProfileKind,
    start: Option<Instant>,
) {
    let (Some(counters), Some(start)) = (counters, start) else {
        return;
    };
    let nanos = start.elapsed().as_nanos().min(u64::MAX as u128) as u64;
    counters.record(kind, nanos);
}

pub(crate) fn record_profile_timer(kind: LookupProfileKind, start: Option<Instant>) {
    record_into(counters(), kind, start);
}

/// Retrieves a snapshot of the counters, or `None` when profiling is disabled.
///
/// When `reset` is true the counters are zeroed as they are read.
pub fn profile_snapshot(reset: bool) -> Option<LookupProfileSnapshot> {
    counters().map(|c| c.snapshot(reset))
}
