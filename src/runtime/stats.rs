//! Per-task timing accumulators
//!
//! A task carries one [`DurationStats`] for its own codelet invocations plus a
//! set of named sub-phase timers ([`PhaseTimers`]) that codelets feed with the
//! durations of their internal steps (e.g. load/decode/store). Both are plain
//! per-instance state: no synchronization, one owner per thread.

use std::time::Duration;

/// Duration accumulator: call count, total, min and max.
///
/// The first recorded duration seeds both min and max, so they are
/// meaningful starting from the second call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationStats {
    n_calls: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl DurationStats {
    /// Record one duration sample
    pub fn record(&mut self, d: Duration) {
        self.total += d;
        if self.n_calls == 0 {
            self.min = d;
            self.max = d;
        } else {
            self.min = self.min.min(d);
            self.max = self.max.max(d);
        }
        self.n_calls += 1;
    }

    /// Number of recorded samples
    pub fn n_calls(&self) -> u64 {
        self.n_calls
    }

    /// Sum of all recorded durations
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Average recorded duration (zero if nothing was recorded)
    pub fn avg(&self) -> Duration {
        if self.n_calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.n_calls as u32
        }
    }

    /// Smallest recorded duration
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Largest recorded duration
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Zero all counters
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Named sub-phase timers, independent of the task's own totals.
///
/// Keys keep their registration order for reporting. Updating an
/// unregistered key registers it on the fly.
#[derive(Debug, Default)]
pub struct PhaseTimers {
    entries: Vec<(String, DurationStats)>,
}

impl PhaseTimers {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-declare a phase so it shows up in reports even before its
    /// first update
    pub fn register(&mut self, key: impl Into<String>) {
        let key = key.into();
        if !self.entries.iter().any(|(k, _)| *k == key) {
            self.entries.push((key, DurationStats::default()));
        }
    }

    /// Accumulate one duration sample into a phase
    pub fn update(&mut self, key: &str, d: Duration) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, stats)) => stats.record(d),
            None => {
                let mut stats = DurationStats::default();
                stats.record(d);
                self.entries.push((key.to_string(), stats));
            }
        }
    }

    /// Look up a phase accumulator
    pub fn get(&self, key: &str) -> Option<&DurationStats> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, s)| s)
    }

    /// Iterate phases in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DurationStats)> {
        self.entries.iter().map(|(k, s)| (k.as_str(), s))
    }

    /// Zero every phase accumulator, keeping the registered keys
    pub fn reset(&mut self) {
        for (_, stats) in &mut self.entries {
            stats.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_min_max() {
        let mut stats = DurationStats::default();
        stats.record(Duration::from_micros(10));
        assert_eq!(stats.min(), Duration::from_micros(10));
        assert_eq!(stats.max(), Duration::from_micros(10));

        stats.record(Duration::from_micros(4));
        stats.record(Duration::from_micros(30));
        assert_eq!(stats.n_calls(), 3);
        assert_eq!(stats.min(), Duration::from_micros(4));
        assert_eq!(stats.max(), Duration::from_micros(30));
        assert_eq!(stats.total(), Duration::from_micros(44));
    }

    #[test]
    fn test_phase_timers_accumulate_independently() {
        let mut phases = PhaseTimers::new();
        phases.register("load");
        phases.register("decode");

        phases.update("load", Duration::from_micros(5));
        phases.update("load", Duration::from_micros(7));
        phases.update("decode", Duration::from_micros(100));

        assert_eq!(phases.get("load").unwrap().n_calls(), 2);
        assert_eq!(phases.get("load").unwrap().total(), Duration::from_micros(12));
        assert_eq!(phases.get("decode").unwrap().n_calls(), 1);

        let keys: Vec<_> = phases.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["load", "decode"]);
    }

    #[test]
    fn test_phase_update_registers_unknown_key() {
        let mut phases = PhaseTimers::new();
        phases.update("store", Duration::from_micros(1));
        assert_eq!(phases.get("store").unwrap().n_calls(), 1);
    }

    #[test]
    fn test_reset_keeps_keys() {
        let mut phases = PhaseTimers::new();
        phases.update("load", Duration::from_micros(3));
        phases.reset();
        assert_eq!(phases.get("load").unwrap().n_calls(), 0);
        assert_eq!(phases.get("load").unwrap().total(), Duration::ZERO);
    }
}
