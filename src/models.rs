use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

/// Display value for "out of the top 4 / absent that day".
pub const SENTINEL_RANK: u32 = 5;

/// Deepest rank that is charted as itself.
pub const CHART_DEPTH: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankRecord {
    pub date: NaiveDate,
    pub keyword: String,
    pub location: String,
    pub rank: u32,
    pub position_in_pack: i64,
    pub business_name: String,
    pub google_rating: f64,
    pub ratings_count: i64,
    pub global_search_volume: i64,
    pub regional_search_volume: i64,
}

impl RankRecord {
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }

    /// Rank as drawn on a chart: 1..=4, or the sentinel.
    pub fn display_rank(&self) -> u32 {
        if self.rank <= CHART_DEPTH {
            self.rank
        } else {
            SENTINEL_RANK
        }
    }
}

/// Calendar month used to bucket records, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Long title such as `January 2024`.
    pub fn title(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(first) => first.format("%B %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Badge tier for percentage metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Strong,
    Fair,
    Weak,
}

impl Tier {
    pub fn from_percent(value: u32) -> Self {
        match value {
            80..=u32::MAX => Tier::Strong,
            50..=79 => Tier::Fair,
            _ => Tier::Weak,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Strong => "strong",
            Tier::Fair => "fair",
            Tier::Weak => "weak",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewStats {
    /// Largest review count seen in the month; counts are cumulative.
    pub total: i64,
    pub min: i64,
    pub max: i64,
}

/// Statistics for one entity (business or keyword) within one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStat {
    pub entity: String,
    pub record_count: usize,
    pub average_rank: f64,
    pub min_rank: u32,
    pub max_rank: u32,
    pub days_in_top3: usize,
    pub days_appeared: usize,
    pub pack_appearance_rate: u32,
    pub consistency_score: u32,
    pub rating: Option<RatingStats>,
    pub reviews: ReviewStats,
}

impl MonthlyStat {
    pub fn pack_tier(&self) -> Tier {
        Tier::from_percent(self.pack_appearance_rate)
    }

    pub fn consistency_tier(&self) -> Tier {
        Tier::from_percent(self.consistency_score)
    }
}

/// One month of a keyword or business view, entries ranked best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: MonthKey,
    pub days_in_month: usize,
    pub global_search_volume: Option<i64>,
    pub regional_search_volume: Option<i64>,
    pub entries: Vec<MonthlyStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub values: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub record_count: usize,
    pub average_rank: Option<f64>,
    pub days_at_first: usize,
    pub days_in_top3: usize,
    pub max_reviews: i64,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Insight {
    ReviewDeficit { gap: i64, competitor: String },
    ReviewLead { lead: i64, competitor: String },
    RatingDeficit { rating: f64, competitor: String, competitor_rating: f64 },
    LowReviewVolume { reviews: i64, target: i64 },
}

impl fmt::Display for Insight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insight::ReviewDeficit { gap, competitor } => write!(
                f,
                "You need {gap} more reviews to match {competitor}'s review count."
            ),
            Insight::ReviewLead { lead, competitor } => {
                write!(f, "You have {lead} more reviews than {competitor}.")
            }
            Insight::RatingDeficit {
                rating,
                competitor,
                competitor_rating,
            } => write!(
                f,
                "Your rating ({rating:.1}) is below {competitor} ({competitor_rating:.1}). \
                 Focus on improving customer experience."
            ),
            Insight::LowReviewVolume { reviews, target } => write!(
                f,
                "Low review count ({reviews}) may be limiting your rankings. Aim for {target}+ reviews."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub primary: EntitySummary,
    pub competitor: Option<EntitySummary>,
    pub review_gap: i64,
    pub total_days: usize,
    pub insights: Vec<Insight>,
}
