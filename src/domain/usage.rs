//! Per-call billing/effort accounting (`UsageRecord`) and per-job rollups.

use serde::{Deserialize, Serialize};

use crate::error::StageName;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub stage: StageName,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub duration_seconds: f64,
    pub request_count: u32,
}

/// The `processing` block of `meta.json`: a job's totals, the sum over its
/// `UsageRecord`s (invariant 5, §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingTotals {
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub total_time_seconds: f64,
    pub request_count: u32,
    pub stages_completed: Vec<StageName>,
}

impl ProcessingTotals {
    pub fn accumulate(&mut self, record: &UsageRecord) {
        self.total_tokens += record.input_tokens + record.output_tokens;
        self.total_cost_usd = round4(self.total_cost_usd + record.cost_usd);
        self.total_time_seconds += record.duration_seconds;
        self.request_count += record.request_count;
        if !self.stages_completed.contains(&record.stage) {
            self.stages_completed.push(record.stage);
        }
    }
}

/// Round to 4 decimal places, matching the USD-cost rounding tolerance in §8.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
