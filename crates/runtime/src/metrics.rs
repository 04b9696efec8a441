use std::collections::BTreeMap;

use serde::Serialize;

/// Store-level counters. Names are stable so snapshots can be diffed across runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    FetchesIssued,
    FetchesFailed,
    /// Fetch completions that arrived after the store moved on (clear/detach).
    FetchesStale,
    LayersRegistered,
    OverlayRebuilds,
    /// Settle timers whose generation was superseded before they fired.
    StaleSettlesDropped,
    /// Renderer calls skipped because the target layer/source was gone.
    RendererInconsistencies,
    PopupsShown,
}

/// Gauges overwritten after each store mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gauge {
    RegisteredLayers,
    VisibleLayers,
    LoadingTokens,
}

/// Deterministic metrics aggregation.
///
/// Uses sorted maps so snapshots have stable ordering and never depend on
/// wall-clock time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<Counter, u64>,
    gauges: BTreeMap<Gauge, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: Vec<(Counter, u64)>,
    pub gauges: Vec<(Gauge, u64)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
        self.gauges.clear();
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(&counter).copied().unwrap_or(0)
    }

    pub fn incr(&mut self, counter: Counter) {
        *self.counters.entry(counter).or_insert(0) += 1;
    }

    pub fn gauge(&self, gauge: Gauge) -> Option<u64> {
        self.gauges.get(&gauge).copied()
    }

    pub fn set_gauge(&mut self, gauge: Gauge, value: u64) {
        self.gauges.insert(gauge, value);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (*k, *v)).collect(),
            gauges: self.gauges.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Counter, Gauge, Metrics};

    #[test]
    fn counters_accumulate() {
        let mut m = Metrics::new();
        m.incr(Counter::FetchesIssued);
        m.incr(Counter::FetchesIssued);
        assert_eq!(m.counter(Counter::FetchesIssued), 2);
        assert_eq!(m.counter(Counter::FetchesFailed), 0);
    }

    #[test]
    fn gauges_overwrite() {
        let mut m = Metrics::new();
        assert_eq!(m.gauge(Gauge::VisibleLayers), None);
        m.set_gauge(Gauge::VisibleLayers, 3);
        m.set_gauge(Gauge::VisibleLayers, 1);
        assert_eq!(m.gauge(Gauge::VisibleLayers), Some(1));
    }

    #[test]
    fn snapshot_is_stably_sorted() {
        let mut m = Metrics::new();
        m.incr(Counter::PopupsShown);
        m.incr(Counter::FetchesIssued);
        m.set_gauge(Gauge::LoadingTokens, 2);
        m.set_gauge(Gauge::RegisteredLayers, 5);

        let snap = m.snapshot();
        assert_eq!(
            snap.counters,
            vec![(Counter::FetchesIssued, 1), (Counter::PopupsShown, 1)]
        );
        assert_eq!(
            snap.gauges,
            vec![(Gauge::RegisteredLayers, 5), (Gauge::LoadingTokens, 2)]
        );
    }
}
