use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{ComparisonSummary, EntitySummary, Insight, RankRecord};
use crate::stats::{filter_records, mean, Pivot};

/// Thresholds behind the generated insight statements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightRules {
    /// Review count below which a poorly ranked client is told to collect more.
    pub review_target: i64,
    /// Average rank above which low review volume is flagged.
    pub rank_threshold: f64,
    /// Name used in review messages when no competitor is selected.
    pub fallback_competitor: String,
}

impl Default for InsightRules {
    fn default() -> Self {
        Self {
            review_target: 50,
            rank_threshold: 2.0,
            fallback_competitor: "top competitor".to_string(),
        }
    }
}

pub fn summarize_entity(name: &str, records: &[&RankRecord]) -> EntitySummary {
    EntitySummary {
        name: name.to_string(),
        record_count: records.len(),
        average_rank: mean(records.iter().map(|r| r.rank as f64)),
        days_at_first: days_where(records, |r| r.rank == 1),
        days_in_top3: days_where(records, |r| r.rank <= 3),
        max_reviews: records.iter().map(|r| r.ratings_count).max().unwrap_or(0),
        average_rating: mean(records.iter().map(|r| r.google_rating)),
    }
}

fn days_where(records: &[&RankRecord], pred: impl Fn(&RankRecord) -> bool) -> usize {
    records
        .iter()
        .filter(|r| pred(**r))
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .len()
}

/// Client-vs-competitor summary over the whole dataset.
pub fn compare(
    records: &[RankRecord],
    primary: &str,
    competitor: Option<&str>,
    rules: &InsightRules,
) -> ComparisonSummary {
    let primary_summary = summarize_entity(
        primary,
        &filter_records(records, Pivot::Business, primary),
    );
    let competitor_summary = competitor
        .map(|name| summarize_entity(name, &filter_records(records, Pivot::Business, name)));

    let competitor_reviews = competitor_summary
        .as_ref()
        .map(|c| c.max_reviews)
        .unwrap_or(0);
    let review_gap = competitor_reviews - primary_summary.max_reviews;
    let insights = insights(&primary_summary, competitor_summary.as_ref(), rules);
    let total_days = records.iter().map(|r| r.date).collect::<BTreeSet<_>>().len();

    ComparisonSummary {
        primary: primary_summary,
        competitor: competitor_summary,
        review_gap,
        total_days,
        insights,
    }
}

/// Up to three insights. The review rules are exclusive of each other; the
/// rating and volume rules are checked independently.
pub fn insights(
    primary: &EntitySummary,
    competitor: Option<&EntitySummary>,
    rules: &InsightRules,
) -> Vec<Insight> {
    let mut out = Vec::new();
    let competitor_reviews = competitor.map(|c| c.max_reviews).unwrap_or(0);
    let gap = competitor_reviews - primary.max_reviews;
    let competitor_name = competitor
        .map(|c| c.name.clone())
        .unwrap_or_else(|| rules.fallback_competitor.clone());

    if gap > 0 {
        out.push(Insight::ReviewDeficit {
            gap,
            competitor: competitor_name.clone(),
        });
    } else if gap < 0 && competitor.is_some() {
        out.push(Insight::ReviewLead {
            lead: -gap,
            competitor: competitor_name.clone(),
        });
    }

    if let Some(competitor) = competitor {
        let rating = round_to(primary.average_rating.unwrap_or(0.0), 1);
        let competitor_rating = round_to(competitor.average_rating.unwrap_or(0.0), 1);
        if rating < competitor_rating {
            out.push(Insight::RatingDeficit {
                rating,
                competitor: competitor_name,
                competitor_rating,
            });
        }
    }

    let ranks_poorly = primary
        .average_rank
        .map(|avg| round_to(avg, 2) > rules.rank_threshold)
        .unwrap_or(false);
    if ranks_poorly && primary.max_reviews < rules.review_target {
        out.push(Insight::LowReviewVolume {
            reviews: primary.max_reviews,
            target: rules.review_target,
        });
    }

    out
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
