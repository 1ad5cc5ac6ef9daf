//! Renderable view snapshots.
//!
//! A snapshot bundles everything one dashboard view shows for a given
//! selection, so report writers and capture tools never touch the raw
//! dataset themselves.

use serde::Serialize;
use tracing::debug;

use crate::compare;
use crate::config::Config;
use crate::dataset::{Dataset, Selection, ViewMode};
use crate::error::{Result, TrackerError};
use crate::models::{ComparisonSummary, MonthSummary};
use crate::stats;
use crate::timeseries::{self, TimeSeries};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewRequest {
    Keyword(String),
    Business(String),
    Comparison {
        primary: String,
        competitor: Option<String>,
    },
}

impl ViewRequest {
    /// The request implied by the session's current view, if its selection
    /// is complete.
    pub fn from_selection(selection: &Selection) -> Option<Self> {
        match selection.view {
            ViewMode::Keyword => selection.keyword.clone().map(ViewRequest::Keyword),
            ViewMode::Business => selection.business.clone().map(ViewRequest::Business),
            ViewMode::Comparison => selection.primary.clone().map(|primary| {
                ViewRequest::Comparison {
                    primary,
                    competitor: selection.competitor.clone(),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub name: String,
    pub months: Vec<MonthSummary>,
    pub chart: TimeSeries,
    /// Points to skip between x-axis date labels.
    pub tick_interval: usize,
}

impl EntityView {
    fn new(name: &str, months: Vec<MonthSummary>, chart: TimeSeries) -> Self {
        Self {
            name: name.to_string(),
            months,
            tick_interval: chart.tick_interval(),
            chart,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum Snapshot {
    Keyword(EntityView),
    Business(EntityView),
    Comparison(ComparisonSummary),
}

pub fn snapshot(dataset: &Dataset, request: &ViewRequest, config: &Config) -> Result<Snapshot> {
    let records = dataset.records();
    debug!(?request, records = records.len(), "building snapshot");

    match request {
        ViewRequest::Keyword(keyword) => {
            if !dataset.has_keyword(keyword) {
                return Err(TrackerError::UnknownKeyword(keyword.clone()));
            }
            Ok(Snapshot::Keyword(EntityView::new(
                keyword,
                stats::keyword_view(records, keyword),
                timeseries::keyword_series(records, keyword),
            )))
        }
        ViewRequest::Business(business) => {
            if !dataset.has_business(business) {
                return Err(TrackerError::UnknownBusiness(business.clone()));
            }
            Ok(Snapshot::Business(EntityView::new(
                business,
                stats::business_view(records, business),
                timeseries::business_series(records, business)
                    .limit_series(config.chart.series_limit),
            )))
        }
        ViewRequest::Comparison {
            primary,
            competitor,
        } => {
            for name in std::iter::once(primary).chain(competitor.iter()) {
                if !dataset.has_business(name) {
                    return Err(TrackerError::UnknownBusiness(name.clone()));
                }
            }
            Ok(Snapshot::Comparison(compare::compare(
                records,
                primary,
                competitor.as_deref(),
                &config.insight_rules(),
            )))
        }
    }
}

/// Every keyword and business view, in the order a full export walks them.
pub fn export_plan(dataset: &Dataset, config: &Config) -> Vec<ViewRequest> {
    let mut plan = Vec::new();
    if config.report.include_keywords {
        plan.extend(dataset.keywords().into_iter().map(ViewRequest::Keyword));
    }
    if config.report.include_businesses {
        plan.extend(dataset.businesses().into_iter().map(ViewRequest::Business));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "Date\tKeyword\tLocation\tRank\tPosition in Pack\tBusiness Name\tGoogle Rating\tRatings Count\tGlobal Monthly Search Volume\tRegional Monthly Search Volume
2024-01-01\tplumber\tAustin\t1\t1\tAcme\t4.5\t40\t1000\t100
2024-01-02\tplumber\tAustin\t6\t6\tAcme\t4.5\t41\t1000\t100
2024-01-02\tplumber\tAustin\t2\t2\tBolt\t4.0\t90\t1000\t100";

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.ingest("export.tsv", EXPORT).unwrap();
        dataset
    }

    #[test]
    fn keyword_snapshot_carries_stats_and_chart() {
        let snap = snapshot(
            &dataset(),
            &ViewRequest::Keyword("plumber".to_string()),
            &Config::default(),
        )
        .unwrap();
        let Snapshot::Keyword(view) = snap else {
            panic!("expected a keyword snapshot");
        };
        assert_eq!(view.months.len(), 1);
        assert_eq!(view.chart.points[0].values["Acme"], 1);
        assert_eq!(view.chart.points[1].values["Acme"], 5);
        assert_eq!(view.chart.points[1].values["Bolt"], 2);
        assert_eq!(view.tick_interval, 0);
    }

    #[test]
    fn long_charts_carry_a_wider_tick_interval() {
        let mut export = String::from(EXPORT.lines().next().unwrap());
        for day in 1..=24 {
            export.push_str(&format!(
                "\n2024-01-{day:02}\tplumber\tAustin\t1\t1\tAcme\t4.5\t40\t1000\t100"
            ));
        }
        let mut data = Dataset::new();
        data.ingest("month.tsv", &export).unwrap();

        let snap = snapshot(
            &data,
            &ViewRequest::Business("Acme".to_string()),
            &Config::default(),
        )
        .unwrap();
        let Snapshot::Business(view) = snap else {
            panic!("expected a business snapshot");
        };
        assert_eq!(view.chart.points.len(), 24);
        assert_eq!(view.tick_interval, 2);
        assert_eq!(serde_json::to_value(&view).unwrap()["tick_interval"], 2);
    }

    #[test]
    fn unknown_selections_are_errors() {
        let config = Config::default();
        let data = dataset();
        assert!(matches!(
            snapshot(&data, &ViewRequest::Keyword("roofer".to_string()), &config),
            Err(TrackerError::UnknownKeyword(_))
        ));
        assert!(matches!(
            snapshot(
                &data,
                &ViewRequest::Comparison {
                    primary: "Acme".to_string(),
                    competitor: Some("Nobody".to_string()),
                },
                &config
            ),
            Err(TrackerError::UnknownBusiness(_))
        ));
    }

    #[test]
    fn snapshots_serialize_with_a_view_tag() {
        let snap = snapshot(
            &dataset(),
            &ViewRequest::Comparison {
                primary: "Acme".to_string(),
                competitor: Some("Bolt".to_string()),
            },
            &Config::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["view"], "comparison");
        assert_eq!(json["review_gap"], 49);
        assert_eq!(json["insights"][0]["kind"], "review_deficit");
    }

    #[test]
    fn selection_maps_to_request() {
        let mut selection = Selection::default();
        assert_eq!(ViewRequest::from_selection(&selection), None);
        selection.keyword = Some("plumber".to_string());
        assert_eq!(
            ViewRequest::from_selection(&selection),
            Some(ViewRequest::Keyword("plumber".to_string()))
        );
        selection.view = ViewMode::Comparison;
        assert_eq!(ViewRequest::from_selection(&selection), None);
    }

    #[test]
    fn export_plan_walks_keywords_then_businesses() {
        let plan = export_plan(&dataset(), &Config::default());
        assert_eq!(
            plan,
            vec![
                ViewRequest::Keyword("plumber".to_string()),
                ViewRequest::Business("Acme".to_string()),
                ViewRequest::Business("Bolt".to_string()),
            ]
        );
    }
}
