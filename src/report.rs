use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::dataset::{format_long_date, Dataset};
use crate::error::Result;
use crate::models::{ComparisonSummary, EntitySummary, MonthSummary};
use crate::snapshot::{self, EntityView, Snapshot, ViewRequest};
use crate::timeseries::{
    format_axis_rank, format_date_label, format_tooltip_rank, tooltip_order, TimeSeries,
};

/// Tracked-day count for one month of the loaded data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCoverage {
    pub month: String,
    pub days: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub entries: usize,
    pub uploads: usize,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub total_days: usize,
    pub months: Vec<MonthCoverage>,
    pub keywords: Vec<String>,
    pub businesses: Vec<String>,
}

impl Overview {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let range = dataset.date_range();
        Self {
            entries: dataset.len(),
            uploads: dataset.uploads().len(),
            first_date: range.map(|(first, _)| format_long_date(first)),
            last_date: range.map(|(_, last)| format_long_date(last)),
            total_days: dataset.total_days(),
            months: dataset
                .months()
                .into_iter()
                .map(|month| MonthCoverage {
                    month: month.to_string(),
                    days: dataset.days_in_month(month),
                })
                .collect(),
            keywords: dataset.keywords(),
            businesses: dataset.businesses(),
        }
    }
}

/// Everything a full export contains, in page order.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDocument {
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub views: Vec<Snapshot>,
}

pub fn build_document(
    dataset: &Dataset,
    config: &Config,
    comparison: Option<&ViewRequest>,
) -> Result<ReportDocument> {
    let mut views = Vec::new();
    if let Some(request) = comparison {
        views.push(snapshot::snapshot(dataset, request, config)?);
    }
    for request in snapshot::export_plan(dataset, config) {
        views.push(snapshot::snapshot(dataset, &request, config)?);
    }

    Ok(ReportDocument {
        generated_at: Utc::now(),
        overview: Overview::from_dataset(dataset),
        views,
    })
}

pub fn render_markdown(document: &ReportDocument) -> String {
    let mut output = String::new();
    let overview = &document.overview;

    let _ = writeln!(output, "# Local Rank Report");
    let _ = writeln!(
        output,
        "Generated {}",
        document.generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");

    match (&overview.first_date, &overview.last_date) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                output,
                "- Data loaded: {} entries from {} upload(s) | Date range: {} - {}",
                overview.entries, overview.uploads, first, last
            );
        }
        _ => {
            let _ = writeln!(output, "No data loaded.");
        }
    }
    let _ = writeln!(output, "- Tracked days: {}", overview.total_days);
    let months: Vec<String> = overview
        .months
        .iter()
        .map(|coverage| format!("{} ({} days)", coverage.month, coverage.days))
        .collect();
    let _ = writeln!(output, "- Months: {}", months.join(", "));
    let _ = writeln!(output, "- Keywords: {}", overview.keywords.len());
    let _ = writeln!(output, "- Businesses: {}", overview.businesses.len());

    for view in &document.views {
        let _ = writeln!(output);
        write_view(&mut output, view);
    }

    output
}

/// Markdown for a single view, as shown on screen.
pub fn render_view_markdown(view: &Snapshot) -> String {
    let mut output = String::new();
    write_view(&mut output, view);
    output
}

fn write_view(output: &mut String, view: &Snapshot) {
    match view {
        Snapshot::Comparison(summary) => write_comparison(output, summary),
        Snapshot::Keyword(view) => write_entity_view(output, "Keyword", view, true),
        Snapshot::Business(view) => write_entity_view(output, "Business", view, false),
    }
}

fn write_entity_view(output: &mut String, label: &str, view: &EntityView, keyword_view: bool) {
    let _ = writeln!(output, "## {}: {}", label, view.name);
    let _ = writeln!(output);
    write_chart(output, &view.chart);

    for month in &view.months {
        if month.entries.is_empty() {
            continue;
        }
        let _ = writeln!(output);
        write_month(output, month, keyword_view);
    }
}

fn write_chart(output: &mut String, chart: &TimeSeries) {
    if chart.points.is_empty() {
        let _ = writeln!(output, "No ranking history for this selection.");
        return;
    }

    let _ = writeln!(output, "### Daily Rank (top 4)");
    let _ = writeln!(output, "| Date | {} | Order |", chart.series.join(" | "));
    let _ = writeln!(output, "|---|{}---|", "---|".repeat(chart.series.len()));
    for point in &chart.points {
        let cells: Vec<String> = chart
            .series
            .iter()
            .map(|name| {
                point
                    .values
                    .get(name)
                    .map(|value| format_axis_rank(*value))
                    .unwrap_or_default()
            })
            .collect();
        let order: Vec<String> = tooltip_order(point)
            .into_iter()
            .filter(|(name, _)| chart.series.iter().any(|charted| charted == name))
            .map(|(name, value)| format!("{} {}", name, format_tooltip_rank(value)))
            .collect();
        let _ = writeln!(
            output,
            "| {} | {} | {} |",
            format_date_label(point.date),
            cells.join(" | "),
            order.join(", ")
        );
    }
}

fn write_month(output: &mut String, month: &MonthSummary, keyword_view: bool) {
    let _ = write!(
        output,
        "### {} ({} tracked days",
        month.month.title(),
        month.days_in_month
    );
    if let (Some(global), Some(regional)) =
        (month.global_search_volume, month.regional_search_volume)
    {
        let _ = write!(
            output,
            ", search volume {} global / {} regional",
            global, regional
        );
    }
    let _ = writeln!(output, ")");

    if keyword_view {
        let _ = writeln!(
            output,
            "| Business | Avg Rank | Range | Pack Appearance | Consistency | Rating | Reviews |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    } else {
        let _ = writeln!(
            output,
            "| Keyword | Avg Rank | Range | Pack Appearance | Consistency | Days in Top 3 |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
    }

    for stat in &month.entries {
        let _ = write!(
            output,
            "| {} | #{:.2} | {} - {} | {}% ({}) | {}% ({}) |",
            stat.entity,
            stat.average_rank,
            stat.min_rank,
            stat.max_rank,
            stat.pack_appearance_rate,
            stat.pack_tier(),
            stat.consistency_score,
            stat.consistency_tier()
        );
        if keyword_view {
            let rating = stat
                .rating
                .as_ref()
                .map(|r| format!("{:.2}", r.average))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(output, " {} | {} |", rating, stat.reviews.total);
        } else {
            let _ = writeln!(output, " {} |", stat.days_in_top3);
        }
    }
}

fn write_comparison(output: &mut String, summary: &ComparisonSummary) {
    let _ = writeln!(
        output,
        "## {} - Performance Summary",
        summary.primary.name
    );
    write_entity_summary(output, &summary.primary, summary.total_days);

    if let Some(competitor) = &summary.competitor {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Compared to {}", competitor.name);
        write_entity_summary(output, competitor, summary.total_days);
        let _ = writeln!(output, "- Review gap: {}", summary.review_gap);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Actionable Insights");
    if summary.insights.is_empty() {
        let _ = writeln!(output, "No insights for this selection.");
    } else {
        for insight in &summary.insights {
            let _ = writeln!(output, "- {}", insight);
        }
    }
}

fn write_entity_summary(output: &mut String, summary: &EntitySummary, total_days: usize) {
    let avg_rank = summary
        .average_rank
        .map(|avg| format!("#{:.2}", avg))
        .unwrap_or_else(|| "N/A".to_string());
    let rating = summary
        .average_rating
        .map(|avg| format!("{:.1}", avg))
        .unwrap_or_else(|| "N/A".to_string());

    let _ = writeln!(output, "- Avg rank: {}", avg_rank);
    let _ = writeln!(output, "- Review count: {}", summary.max_reviews);
    let _ = writeln!(output, "- Rating: {}", rating);
    let _ = writeln!(
        output,
        "- Days at #1: {} out of {} days",
        summary.days_at_first, total_days
    );
    let _ = writeln!(
        output,
        "- Days in top 3: {} out of {} days",
        summary.days_in_top3, total_days
    );
}

pub fn render_json(document: &ReportDocument) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "Date\tKeyword\tLocation\tRank\tPosition in Pack\tBusiness Name\tGoogle Rating\tRatings Count\tGlobal Monthly Search Volume\tRegional Monthly Search Volume
01/01/2024\tplumber\tAustin\t1\t1\tAcme\t4.5\t40\t1000\t100
01/02/2024\tplumber\tAustin\t6\t6\tAcme\t4.5\t41\t1000\t100
01/02/2024\tplumber\tAustin\t2\t2\tBolt\t4.8\t90\t1000\t100
02/01/2024\tdrain cleaning\tAustin\t3\t3\tAcme\t4.5\t42\t300\t30";

    fn dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.ingest("export.tsv", EXPORT).unwrap();
        dataset
    }

    #[test]
    fn markdown_has_overview_and_every_view() {
        let document = build_document(&dataset(), &Config::default(), None).unwrap();
        assert_eq!(document.views.len(), 4);

        let report = render_markdown(&document);
        assert!(report.contains("# Local Rank Report"));
        assert!(report.contains("Data loaded: 4 entries from 1 upload(s) | Date range: Jan 1, 2024 - Feb 1, 2024"));
        assert!(report.contains("## Keyword: plumber"));
        assert!(report.contains("## Business: Bolt"));
        assert!(report.contains("### January 2024 (2 tracked days, search volume 1000 global / 100 regional)"));
        assert!(report.contains("- Months: 2024-01 (2 days), 2024-02 (1 days)"));
        assert!(report.contains("| Date | Acme | Bolt | Order |"));
        assert!(report.contains("| Jan 1 | #1 |  | Acme #1 |"));
        assert!(report.contains("| Jan 2 | Out | #2 | Bolt #2, Acme Out of Top 4 |"));
    }

    #[test]
    fn comparison_section_leads_the_report() {
        let request = ViewRequest::Comparison {
            primary: "Acme".to_string(),
            competitor: Some("Bolt".to_string()),
        };
        let document = build_document(&dataset(), &Config::default(), Some(&request)).unwrap();
        assert!(matches!(document.views[0], Snapshot::Comparison(_)));

        let report = render_markdown(&document);
        assert!(report.contains("## Acme - Performance Summary"));
        assert!(report.contains("### Compared to Bolt"));
        assert!(report.contains("You need 48 more reviews to match Bolt's review count."));
        assert!(report.contains("Low review count (42)"));
    }

    #[test]
    fn single_view_renders_business_table() {
        let view = snapshot::snapshot(
            &dataset(),
            &ViewRequest::Business("Acme".to_string()),
            &Config::default(),
        )
        .unwrap();
        let text = render_view_markdown(&view);
        assert!(text.starts_with("## Business: Acme"));
        assert!(text.contains("| Keyword | Avg Rank | Range | Pack Appearance | Consistency | Days in Top 3 |"));
        assert!(text.contains("| plumber | #3.50 | 1 - 6 | 100% (strong) | 38% (weak) | 1 |"));
    }

    #[test]
    fn sections_can_be_switched_off() {
        let mut config = Config::default();
        config.report.include_businesses = false;
        let document = build_document(&dataset(), &config, None).unwrap();
        assert_eq!(document.views.len(), 2);
        assert!(document
            .views
            .iter()
            .all(|view| matches!(view, Snapshot::Keyword(_))));
    }

    #[test]
    fn json_report_is_structured() {
        let document = build_document(&dataset(), &Config::default(), None).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&render_json(&document).unwrap()).unwrap();
        assert_eq!(json["overview"]["entries"], 4);
        assert_eq!(json["overview"]["months"][0]["month"], "2024-01");
        assert_eq!(json["overview"]["months"][0]["days"], 2);
        assert_eq!(json["views"][0]["view"], "keyword");
        assert_eq!(json["views"][0]["name"], "drain cleaning");
        assert_eq!(json["views"][0]["months"][0]["month"], "2024-02");
    }
}
