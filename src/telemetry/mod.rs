//! Telemetry aggregator: token, cost, and timing accounting for a session.
//!
//! Pure accumulation behind a single mutex, the single-writer discipline
//! the concurrent fan-out requires. Costs are derived from a per-family
//! rate table; unknown families cost zero and are flagged rather than
//! failing the call. The context-window gauge is `used / capacity` clamped
//! to [0, 1], and indeterminate (`None`) when the capacity is unknown.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::memory::CacheCounters;
use crate::router::{ModelCallRecord, ModelFamily, TierLevel};

/// Per-family pricing and context-window data.
#[derive(Debug, Clone)]
pub struct FamilyRates {
    /// USD per million input tokens.
    pub input_per_mtok: f64,
    /// USD per million output tokens.
    pub output_per_mtok: f64,
    /// Context window capacity in tokens, when known.
    pub context_window: Option<u64>,
}

/// Rate lookup keyed by normalized family name.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    rates: BTreeMap<String, FamilyRates>,
}

impl RateTable {
    /// The built-in catalog for the default tier ladder.
    pub fn builtin() -> Self {
        Self::default()
            .with_rate(
                "gpt-4o",
                FamilyRates {
                    input_per_mtok: 2.50,
                    output_per_mtok: 10.00,
                    context_window: Some(128_000),
                },
            )
            .with_rate(
                "gpt-4o-mini",
                FamilyRates {
                    input_per_mtok: 0.15,
                    output_per_mtok: 0.60,
                    context_window: Some(128_000),
                },
            )
            .with_rate(
                "gpt-3.5-turbo",
                FamilyRates {
                    input_per_mtok: 0.50,
                    output_per_mtok: 1.50,
                    context_window: Some(16_385),
                },
            )
    }

    /// Add or override a family's rates.
    pub fn with_rate(mut self, family: impl Into<String>, rates: FamilyRates) -> Self {
        self.rates.insert(family.into(), rates);
        self
    }

    /// Rates for a family, if known.
    pub fn rates_for(&self, family: &ModelFamily) -> Option<&FamilyRates> {
        self.rates.get(family.as_str())
    }
}

/// Per-family accumulated usage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FamilyTotals {
    /// Completed calls served by this family.
    pub calls: u64,
    /// Summed input tokens.
    pub input_tokens: u64,
    /// Summed output tokens.
    pub output_tokens: u64,
    /// Summed cost.
    pub cost_usd: f64,
}

/// Accumulated wall-clock time for one pipeline stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTiming {
    /// Number of recorded durations.
    pub count: u64,
    /// Total elapsed milliseconds.
    pub total_ms: u64,
}

#[derive(Debug, Default)]
struct Totals {
    input_tokens: u64,
    output_tokens: u64,
    cost_usd: f64,
    tier_shifts: u64,
    unknown_rate_calls: u64,
    families: BTreeMap<String, FamilyTotals>,
    stages: BTreeMap<String, StageTiming>,
    /// Family and token footprint of the most recent call, feeding the gauge.
    last_call: Option<(ModelFamily, u64)>,
}

/// Read-only export of the session's cumulative totals.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Summed input tokens across all calls.
    pub input_tokens: u64,
    /// Summed output tokens across all calls.
    pub output_tokens: u64,
    /// Summed cost across all calls.
    pub cost_usd: f64,
    /// Retrieval cache hits.
    pub cache_hits: u64,
    /// Retrieval cache misses.
    pub cache_misses: u64,
    /// Deliberate tier fallbacks that changed the serving tier.
    pub tier_shifts: u64,
    /// Calls costed at zero because the family rate was unknown.
    pub unknown_rate_calls: u64,
    /// Usage grouped by normalized family.
    pub families: BTreeMap<String, FamilyTotals>,
    /// Per-stage timing breakdown keyed by stage name.
    pub stages: BTreeMap<String, StageTiming>,
    /// Context-window usage of the most recent call, in [0, 1];
    /// `None` means indeterminate (no call yet, or unknown capacity).
    pub context_gauge: Option<f64>,
}

impl MetricsSnapshot {
    /// Render the snapshot as CSV: a totals block followed by the
    /// per-stage timing breakdown.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("metric,value\n");
        out.push_str(&format!("input_tokens,{}\n", self.input_tokens));
        out.push_str(&format!("output_tokens,{}\n", self.output_tokens));
        out.push_str(&format!("cost_usd,{:.6}\n", self.cost_usd));
        out.push_str(&format!("cache_hits,{}\n", self.cache_hits));
        out.push_str(&format!("cache_misses,{}\n", self.cache_misses));
        out.push_str(&format!("tier_shifts,{}\n", self.tier_shifts));
        out.push_str(&format!("unknown_rate_calls,{}\n", self.unknown_rate_calls));
        out.push_str(&format!(
            "context_gauge,{}\n",
            self.context_gauge
                .map(|g| format!("{:.4}", g))
                .unwrap_or_else(|| "indeterminate".to_string())
        ));
        out.push_str("\nstage,count,total_ms\n");
        for (stage, timing) in &self.stages {
            out.push_str(&format!("{},{},{}\n", stage, timing.count, timing.total_ms));
        }
        out
    }
}

/// Session-wide usage accumulator.
pub struct TelemetryAggregator {
    totals: Mutex<Totals>,
    rates: RateTable,
    cache: Arc<CacheCounters>,
}

impl TelemetryAggregator {
    /// Create an aggregator over a rate table and the cache's counters.
    pub fn new(rates: RateTable, cache: Arc<CacheCounters>) -> Self {
        Self {
            totals: Mutex::new(Totals::default()),
            rates,
            cache,
        }
    }

    /// Record a completed call: derive its cost from the family rate
    /// (zero + flag when unknown), fill `record.cost_usd`, and fold the
    /// usage into the running totals.
    pub fn record(&self, record: &mut ModelCallRecord) {
        let (cost, known) = match self.rates.rates_for(&record.resolved_family) {
            Some(rates) => (
                (record.input_tokens as f64 / 1e6) * rates.input_per_mtok
                    + (record.output_tokens as f64 / 1e6) * rates.output_per_mtok,
                true,
            ),
            None => (0.0, false),
        };
        record.cost_usd = cost;

        let mut totals = self.totals.lock().expect("telemetry lock poisoned");
        totals.input_tokens += record.input_tokens;
        totals.output_tokens += record.output_tokens;
        totals.cost_usd += cost;
        if !known {
            totals.unknown_rate_calls += 1;
            warn!(
                family = %record.resolved_family,
                "Unknown family rate, cost recorded as 0"
            );
        }

        let family = totals
            .families
            .entry(record.resolved_family.as_str().to_string())
            .or_default();
        family.calls += 1;
        family.input_tokens += record.input_tokens;
        family.output_tokens += record.output_tokens;
        family.cost_usd += cost;

        totals.last_call = Some((
            record.resolved_family.clone(),
            record.input_tokens + record.output_tokens,
        ));
    }

    /// Fold one stage duration into the per-stage breakdown.
    pub fn record_stage(&self, stage: &str, duration: Duration) {
        let mut totals = self.totals.lock().expect("telemetry lock poisoned");
        let timing = totals.stages.entry(stage.to_string()).or_default();
        timing.count += 1;
        timing.total_ms += duration.as_millis() as u64;
    }

    /// Record a deliberate tier fallback. Called once per routed call, and
    /// only when the serving tier differs from the requested one.
    pub fn record_tier_shift(&self, requested: TierLevel, served: TierLevel) {
        debug!(requested = %requested, served = %served, "Tier shift");
        let mut totals = self.totals.lock().expect("telemetry lock poisoned");
        totals.tier_shifts += 1;
    }

    /// Export the cumulative totals.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let totals = self.totals.lock().expect("telemetry lock poisoned");

        let context_gauge = totals.last_call.as_ref().and_then(|(family, used)| {
            self.rates
                .rates_for(family)
                .and_then(|r| r.context_window)
                .map(|capacity| (*used as f64 / capacity as f64).clamp(0.0, 1.0))
        });

        MetricsSnapshot {
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            cost_usd: totals.cost_usd,
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            tier_shifts: totals.tier_shifts,
            unknown_rate_calls: totals.unknown_rate_calls,
            families: totals.families.clone(),
            stages: totals.stages.clone(),
            context_gauge,
        }
    }

    /// Clear every running total and counter. The lock is held for the
    /// whole reset, so no partial state is observable through `snapshot()`.
    pub fn reset(&self) {
        let mut totals = self.totals.lock().expect("telemetry lock poisoned");
        *totals = Totals::default();
        self.cache.reset();
        info!("Session metrics reset");
    }
}
