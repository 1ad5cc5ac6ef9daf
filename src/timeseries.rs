//! Chart-ready rank lines.
//!
//! Each distinct date becomes one point. Once an entity has been seen, every
//! later point carries a value for it: its rank when present and in the
//! top 4, otherwise the sentinel. Lines therefore never break after their
//! first appearance.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{RankRecord, TimeSeriesPoint, SENTINEL_RANK};
use crate::stats::{filter_records, Pivot};

/// Roughly how many date labels fit on the x axis.
const AXIS_LABELS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    /// Charted entities, in order of first appearance (name breaks ties).
    pub series: Vec<String>,
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    /// Keep only the first `limit` lines; points are left intact.
    pub fn limit_series(mut self, limit: usize) -> Self {
        self.series.truncate(limit);
        self
    }

    pub fn tick_interval(&self) -> usize {
        (self.points.len() / AXIS_LABELS).saturating_sub(1)
    }
}

pub fn keyword_series(records: &[RankRecord], keyword: &str) -> TimeSeries {
    build(&filter_records(records, Pivot::Keyword, keyword), Pivot::Keyword)
}

pub fn business_series(records: &[RankRecord], business: &str) -> TimeSeries {
    build(&filter_records(records, Pivot::Business, business), Pivot::Business)
}

pub fn build(records: &[&RankRecord], pivot: Pivot) -> TimeSeries {
    let mut by_date: BTreeMap<NaiveDate, Vec<&RankRecord>> = BTreeMap::new();
    for record in records {
        by_date.entry(record.date).or_default().push(*record);
    }

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut series = Vec::new();
    let mut points = Vec::with_capacity(by_date.len());

    for (date, day) in by_date {
        let mut values: BTreeMap<String, u32> = seen
            .iter()
            .map(|entity| (entity.to_string(), SENTINEL_RANK))
            .collect();

        let mut newcomers = BTreeSet::new();
        for record in day {
            let entity = pivot.entity_of(record);
            values.insert(entity.to_string(), record.display_rank());
            if seen.insert(entity) {
                newcomers.insert(entity);
            }
        }
        series.extend(newcomers.into_iter().map(str::to_string));

        points.push(TimeSeriesPoint { date, values });
    }

    TimeSeries { series, points }
}

/// Short x-axis label, e.g. `Jan 5`.
pub fn format_date_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Y-axis label: `#1`..`#4`, or `Out` for the sentinel.
pub fn format_axis_rank(value: u32) -> String {
    if value >= SENTINEL_RANK {
        "Out".to_string()
    } else {
        format!("#{value}")
    }
}

/// Tooltip text for one value.
pub fn format_tooltip_rank(value: u32) -> String {
    if value >= SENTINEL_RANK {
        "Out of Top 4".to_string()
    } else {
        format!("#{value}")
    }
}

/// Tooltip rows for a point: best rank first, sentinel entries last.
pub fn tooltip_order(point: &TimeSeriesPoint) -> Vec<(&str, u32)> {
    let mut rows: Vec<(&str, u32)> = point
        .values
        .iter()
        .map(|(name, value)| (name.as_str(), *value))
        .collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    rows
}
