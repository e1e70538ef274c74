// ── Water usage accounting ──
//
// Usage is derived, not measured: while the pump relay is on, a fixed
// flow-rate constant is integrated over wall-clock time into a per-day
// bucket keyed by local calendar date.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Day-bucketed water usage in liters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterUsage {
    /// Liters per local calendar date. `daily[today]` is monotonically
    /// non-decreasing within a day.
    #[serde(default)]
    pub daily: BTreeMap<NaiveDate, f64>,
    /// When the last sample was taken; the base of the next integration.
    pub last_sample: DateTime<Utc>,
}

impl Default for WaterUsage {
    fn default() -> Self {
        Self {
            daily: BTreeMap::new(),
            last_sample: Utc::now(),
        }
    }
}

impl WaterUsage {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            daily: BTreeMap::new(),
            last_sample: start,
        }
    }

    /// Add liters to the bucket for `day`.
    pub fn add(&mut self, day: NaiveDate, liters: f64) {
        if liters > 0.0 {
            *self.daily.entry(day).or_insert(0.0) += liters;
        }
    }

    /// Liters recorded for `day` (0 when absent).
    pub fn for_day(&self, day: NaiveDate) -> f64 {
        self.daily.get(&day).copied().unwrap_or(0.0)
    }

    /// Total liters across all recorded days.
    pub fn total(&self) -> f64 {
        self.daily.values().sum()
    }

    /// Merge a concurrent server-side map into this one.
    ///
    /// Union by date key. The local value wins for the current day (it
    /// includes integration the server has not seen); server values win
    /// for historical days, which only the server may have complete.
    pub fn merge_server(&mut self, server: &BTreeMap<NaiveDate, f64>, today: NaiveDate) {
        for (&day, &liters) in server {
            if day != today {
                self.daily.insert(day, liters);
            } else {
                self.daily.entry(day).or_insert(liters);
            }
        }
    }
}
