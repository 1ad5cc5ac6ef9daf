use std::collections::{BTreeMap, BTreeSet};

use crate::models::{MonthKey, MonthSummary, MonthlyStat, RankRecord, RatingStats, ReviewStats};

/// Each point of rank standard deviation costs this much consistency.
pub const CONSISTENCY_PENALTY: f64 = 25.0;

/// Which side of the business/keyword pivot a view groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pivot {
    /// One keyword, rows are businesses.
    Keyword,
    /// One business, rows are keywords.
    Business,
}

impl Pivot {
    fn selects(&self, record: &RankRecord, selection: &str) -> bool {
        match self {
            Pivot::Keyword => record.keyword == selection,
            Pivot::Business => record.business_name == selection,
        }
    }

    /// The name a record is grouped under inside a month.
    pub fn entity_of<'a>(&self, record: &'a RankRecord) -> &'a str {
        match self {
            Pivot::Keyword => record.business_name.as_str(),
            Pivot::Business => record.keyword.as_str(),
        }
    }
}

pub fn filter_records<'a>(
    records: &'a [RankRecord],
    pivot: Pivot,
    selection: &str,
) -> Vec<&'a RankRecord> {
    records
        .iter()
        .filter(|r| pivot.selects(r, selection))
        .collect()
}

/// Monthly statistics for every business that ranked for `keyword`.
///
/// Pack appearance is measured against the days the keyword itself was
/// tracked in that month.
pub fn keyword_view(records: &[RankRecord], keyword: &str) -> Vec<MonthSummary> {
    let subset = filter_records(records, Pivot::Keyword, keyword);

    group_by_month(&subset)
        .into_iter()
        .map(|(month, month_records)| {
            let days_in_month = distinct_days(&month_records);
            let first = month_records.first();
            MonthSummary {
                month,
                days_in_month,
                global_search_volume: first.map(|r| r.global_search_volume),
                regional_search_volume: first.map(|r| r.regional_search_volume),
                entries: entity_stats(&month_records, Pivot::Keyword, days_in_month),
            }
        })
        .collect()
}

/// Monthly statistics for every keyword `business` ranked for.
///
/// Pack appearance is measured against every day tracked in the month
/// across the whole dataset, not just this business.
pub fn business_view(records: &[RankRecord], business: &str) -> Vec<MonthSummary> {
    let subset = filter_records(records, Pivot::Business, business);
    let all_days = days_by_month(records);

    group_by_month(&subset)
        .into_iter()
        .map(|(month, month_records)| {
            let days_in_month = all_days.get(&month).copied().unwrap_or_default();
            MonthSummary {
                month,
                days_in_month,
                global_search_volume: None,
                regional_search_volume: None,
                entries: entity_stats(&month_records, Pivot::Business, days_in_month),
            }
        })
        .collect()
}

fn entity_stats(month_records: &[&RankRecord], pivot: Pivot, days_in_month: usize) -> Vec<MonthlyStat> {
    let mut groups: BTreeMap<&str, Vec<&RankRecord>> = BTreeMap::new();
    for record in month_records {
        groups.entry(pivot.entity_of(record)).or_default().push(*record);
    }

    let mut stats: Vec<MonthlyStat> = groups
        .into_iter()
        .filter_map(|(entity, entries)| {
            monthly_stat(entity, &entries, days_in_month, pivot == Pivot::Keyword)
        })
        .collect();

    rank_entries(&mut stats);
    stats
}

/// Best average rank first; equal averages fall back to name order.
pub fn rank_entries(stats: &mut [MonthlyStat]) {
    stats.sort_by(|a, b| {
        a.average_rank
            .total_cmp(&b.average_rank)
            .then_with(|| a.entity.cmp(&b.entity))
    });
}

/// Statistics for one entity's records within a month. Returns `None` for
/// an empty group rather than producing degenerate values.
pub fn monthly_stat(
    entity: &str,
    entries: &[&RankRecord],
    days_in_month: usize,
    with_rating: bool,
) -> Option<MonthlyStat> {
    let ranks: Vec<u32> = entries.iter().map(|r| r.rank).collect();
    let average_rank = mean(ranks.iter().map(|r| *r as f64))?;
    let min_rank = ranks.iter().copied().min()?;
    let max_rank = ranks.iter().copied().max()?;

    let days_appeared = distinct_days(entries);
    let days_in_top3 = entries
        .iter()
        .filter(|r| r.rank <= 3)
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .len();

    let rating = if with_rating {
        let ratings: Vec<f64> = entries.iter().map(|r| r.google_rating).collect();
        Some(RatingStats {
            average: mean(ratings.iter().copied())?,
            min: ratings.iter().copied().fold(f64::INFINITY, f64::min),
            max: ratings.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    } else {
        None
    };

    let min_reviews = entries.iter().map(|r| r.ratings_count).min()?;
    let max_reviews = entries.iter().map(|r| r.ratings_count).max()?;

    Some(MonthlyStat {
        entity: entity.to_string(),
        record_count: entries.len(),
        average_rank,
        min_rank,
        max_rank,
        days_in_top3,
        days_appeared,
        pack_appearance_rate: pack_appearance_rate(days_appeared, days_in_month),
        consistency_score: consistency_score(&ranks),
        rating,
        reviews: ReviewStats {
            total: max_reviews,
            min: min_reviews,
            max: max_reviews,
        },
    })
}

/// Whole-percent share of `days_in_month` on which the entity appeared.
pub fn pack_appearance_rate(days_appeared: usize, days_in_month: usize) -> u32 {
    if days_in_month == 0 {
        return 0;
    }
    (days_appeared as f64 / days_in_month as f64 * 100.0).round() as u32
}

/// `100 - 25 * population stddev(rank)`, floored at zero and rounded.
pub fn consistency_score(ranks: &[u32]) -> u32 {
    let Some(std_dev) = population_std_dev(ranks.iter().map(|r| *r as f64)) else {
        return 0;
    };
    (100.0 - CONSISTENCY_PENALTY * std_dev).max(0.0).round() as u32
}

pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

pub fn population_std_dev(values: impl Iterator<Item = f64> + Clone) -> Option<f64> {
    let avg = mean(values.clone())?;
    let variance = mean(values.map(|v| (v - avg).powi(2)))?;
    Some(variance.sqrt())
}

pub fn group_by_month<'a>(records: &[&'a RankRecord]) -> BTreeMap<MonthKey, Vec<&'a RankRecord>> {
    let mut months: BTreeMap<MonthKey, Vec<&'a RankRecord>> = BTreeMap::new();
    for record in records {
        months.entry(record.month()).or_default().push(*record);
    }
    months
}

fn days_by_month(records: &[RankRecord]) -> BTreeMap<MonthKey, usize> {
    let mut days: BTreeMap<MonthKey, BTreeSet<chrono::NaiveDate>> = BTreeMap::new();
    for record in records {
        days.entry(record.month()).or_default().insert(record.date);
    }
    days.into_iter().map(|(month, dates)| (month, dates.len())).collect()
}

fn distinct_days(records: &[&RankRecord]) -> usize {
    records.iter().map(|r| r.date).collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(date: &str, keyword: &str, business: &str, rank: u32) -> RankRecord {
        RankRecord {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            keyword: keyword.to_string(),
            location: "Austin, TX".to_string(),
            rank,
            position_in_pack: rank as i64,
            business_name: business.to_string(),
            google_rating: 4.5,
            ratings_count: 30,
            global_search_volume: 1000,
            regional_search_volume: 100,
        }
    }

    #[test]
    fn consistency_matches_population_std_dev() {
        assert_eq!(consistency_score(&[1, 1, 1]), 100);
        // sqrt(8/3) ~= 1.633, 100 - 40.82 ~= 59
        assert_eq!(consistency_score(&[1, 5, 3]), 59);
        assert_eq!(consistency_score(&[1, 20]), 0);
        assert_eq!(consistency_score(&[]), 0);
    }

    #[test]
    fn keyword_view_scores_each_business() {
        let records = vec![
            record("2024-01-01", "plumber", "A", 1),
            record("2024-01-02", "plumber", "A", 1),
            record("2024-01-03", "plumber", "A", 1),
            record("2024-01-01", "plumber", "B", 1),
            record("2024-01-02", "plumber", "B", 5),
            record("2024-01-03", "plumber", "B", 3),
            record("2024-01-03", "electrician", "B", 1),
        ];

        let months = keyword_view(&records, "plumber");
        assert_eq!(months.len(), 1);
        let month = &months[0];
        assert_eq!(month.days_in_month, 3);
        assert_eq!(month.global_search_volume, Some(1000));

        let a = &month.entries[0];
        let b = &month.entries[1];
        assert_eq!(a.entity, "A");
        assert_eq!(a.consistency_score, 100);
        assert_eq!(a.pack_appearance_rate, 100);
        assert_eq!(a.days_in_top3, 3);
        assert_eq!(b.entity, "B");
        assert_eq!(b.consistency_score, 59);
        assert!((b.average_rank - 3.0).abs() < 1e-9);
        assert_eq!((b.min_rank, b.max_rank), (1, 5));
        assert_eq!(b.days_in_top3, 2);
        assert!(b.rating.is_some());
    }

    #[test]
    fn pack_rate_counts_days_present() {
        let mut records: Vec<RankRecord> = (1..=5)
            .map(|d| record(&format!("2024-03-0{d}"), "plumber", "A", 2))
            .collect();
        records.extend((1..=3).map(|d| record(&format!("2024-03-0{d}"), "plumber", "B", 3)));

        let months = keyword_view(&records, "plumber");
        let b = months[0].entries.iter().find(|s| s.entity == "B").unwrap();
        assert_eq!(b.days_appeared, 3);
        assert_eq!(b.pack_appearance_rate, 60);
    }

    #[test]
    fn business_view_uses_dataset_wide_days() {
        let records = vec![
            record("2024-01-01", "plumber", "A", 2),
            record("2024-01-02", "plumber", "A", 4),
            record("2024-01-03", "drain", "Z", 1),
            record("2024-01-04", "drain", "Z", 1),
            record("2024-02-01", "drain", "A", 1),
        ];

        let months = business_view(&records, "A");
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month.to_string(), "2024-01");
        assert_eq!(months[0].days_in_month, 4);
        let plumber = &months[0].entries[0];
        assert_eq!(plumber.entity, "plumber");
        assert_eq!(plumber.pack_appearance_rate, 50);
        assert!(plumber.rating.is_none());

        assert_eq!(months[1].days_in_month, 1);
        assert_eq!(months[1].entries[0].entity, "drain");
    }

    #[test]
    fn ties_are_broken_by_name() {
        let records = vec![
            record("2024-01-01", "plumber", "Zeta", 2),
            record("2024-01-01", "plumber", "Alpha", 2),
            record("2024-01-01", "plumber", "Mid", 1),
        ];
        let months = keyword_view(&records, "plumber");
        let order: Vec<&str> = months[0].entries.iter().map(|s| s.entity.as_str()).collect();
        assert_eq!(order, vec!["Mid", "Alpha", "Zeta"]);
    }

    #[test]
    fn duplicated_uploads_do_not_inflate_day_counts() {
        let once = vec![
            record("2024-01-01", "plumber", "A", 1),
            record("2024-01-02", "plumber", "A", 3),
        ];
        let twice: Vec<RankRecord> = once.iter().chain(once.iter()).cloned().collect();

        let single = &keyword_view(&once, "plumber")[0].entries[0];
        let doubled = &keyword_view(&twice, "plumber")[0].entries[0];
        assert_eq!(doubled.record_count, 2 * single.record_count);
        assert_eq!(doubled.days_in_top3, single.days_in_top3);
        assert_eq!(doubled.pack_appearance_rate, 100);
        assert_eq!(doubled.consistency_score, single.consistency_score);
    }

    #[test]
    fn unknown_selection_yields_no_months() {
        let records = vec![record("2024-01-01", "plumber", "A", 1)];
        assert!(keyword_view(&records, "roofer").is_empty());
        assert!(business_view(&records, "Nobody").is_empty());
    }
}
