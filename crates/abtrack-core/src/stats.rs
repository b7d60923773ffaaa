//! Incremental folding of event records into per-variant and overall counters.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::event::{EventAction, EventRecord, UNKNOWN_VARIANT};

/// Finished counters for one scope (a variant, or all variants).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantStats {
    pub impressions: u64,
    pub clicks: u64,
    pub ctr: f64,
    pub unique_users: u64,
}

/// The window a stats result was computed over, echoed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    pub from: String,
    pub to: String,
}

/// Aggregated statistics for one experiment.
///
/// `variants` is a `BTreeMap` so the serialized form is ordered by label and
/// identical across repeated calls over unchanged data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsWindow {
    pub experiment_id: String,
    pub window: Window,
    pub totals: VariantStats,
    pub variants: BTreeMap<String, VariantStats>,
}

/// Clicks over impressions, or `0.0` when there were no impressions.
pub fn click_through_rate(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        0.0
    } else {
        clicks as f64 / impressions as f64
    }
}

/// Running counters for one scope.
///
/// Distinct users are tracked exactly in a `HashSet`, so memory grows with the
/// number of distinct user ids in the window.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    impressions: u64,
    clicks: u64,
    users: HashSet<String>,
}

impl Accumulator {
    /// Count one record. Unrecognised or missing actions leave the counters
    /// untouched; the user id is recorded regardless.
    pub fn record(&mut self, action: Option<&str>, user_id: Option<&str>) {
        match action.and_then(EventAction::parse) {
            Some(EventAction::LogImpression) => self.impressions += 1,
            Some(EventAction::LogClick) => self.clicks += 1,
            None => {}
        }
        if let Some(user_id) = user_id.filter(|u| !u.is_empty()) {
            if !self.users.contains(user_id) {
                self.users.insert(user_id.to_string());
            }
        }
    }

    pub fn finish(&self) -> VariantStats {
        VariantStats {
            impressions: self.impressions,
            clicks: self.clicks,
            ctr: click_through_rate(self.clicks, self.impressions),
            unique_users: self.users.len() as u64,
        }
    }
}

/// Folds a stream of records, page by page, into a [`StatsWindow`].
#[derive(Debug, Default)]
pub struct StatsFold {
    variants: BTreeMap<String, Accumulator>,
    totals: Accumulator,
    records: u64,
}

impl StatsFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, record: &EventRecord) {
        let variant = record
            .variant
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_VARIANT);
        let action = record.action.as_deref();
        let user_id = record.user_id.as_deref();

        self.variants
            .entry(variant.to_string())
            .or_default()
            .record(action, user_id);
        self.totals.record(action, user_id);
        self.records += 1;
    }

    /// Number of records folded so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn finish(self, experiment_id: &str, window: Window) -> StatsWindow {
        StatsWindow {
            experiment_id: experiment_id.to_string(),
            window,
            totals: self.totals.finish(),
            variants: self
                .variants
                .iter()
                .map(|(label, acc)| (label.clone(), acc.finish()))
                .collect(),
        }
    }
}
