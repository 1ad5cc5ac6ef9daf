//! Session-scoped record store and selection state.
//!
//! A [`Dataset`] only ever grows by whole uploads and is discarded as a
//! unit. Uploads are never deduplicated: loading the same export twice
//! doubles every record.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{MonthKey, RankRecord};
use crate::parser;

#[derive(Debug, Clone, Serialize)]
pub struct UploadBatch {
    pub id: Uuid,
    pub source: String,
    pub accepted: usize,
    pub rejected: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<RankRecord>,
    uploads: Vec<UploadBatch>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[RankRecord] {
        &self.records
    }

    pub fn uploads(&self) -> &[UploadBatch] {
        &self.uploads
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Parse `text` and append its records. On error the dataset is left
    /// exactly as it was.
    pub fn ingest(&mut self, source: &str, text: &str) -> Result<UploadBatch> {
        let parsed = parser::parse_upload(source, text)?;
        let batch = UploadBatch {
            id: Uuid::new_v4(),
            source: source.to_string(),
            accepted: parsed.records.len(),
            rejected: parsed.rejected,
            loaded_at: Utc::now(),
        };

        self.records.extend(parsed.records);
        self.uploads.push(batch.clone());
        info!(
            source,
            batch = %batch.id,
            total = self.records.len(),
            "merged upload into dataset"
        );
        Ok(batch)
    }

    pub fn clear(&mut self) {
        info!(
            records = self.records.len(),
            uploads = self.uploads.len(),
            "clearing dataset"
        );
        self.records.clear();
        self.uploads.clear();
    }

    pub fn records_in(&self, batch: &UploadBatch) -> &[RankRecord] {
        let start: usize = self
            .uploads
            .iter()
            .take_while(|upload| upload.id != batch.id)
            .map(|upload| upload.accepted)
            .sum();
        let end = (start + batch.accepted).min(self.records.len());
        &self.records[start.min(end)..end]
    }

    pub fn keywords(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.keyword.as_str()))
    }

    pub fn businesses(&self) -> Vec<String> {
        distinct(self.records.iter().map(|r| r.business_name.as_str()))
    }

    pub fn months(&self) -> Vec<MonthKey> {
        self.records
            .iter()
            .map(RankRecord::month)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn total_days(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct dates with any record in `month`, across the whole dataset.
    pub fn days_in_month(&self, month: MonthKey) -> usize {
        self.records
            .iter()
            .filter(|r| month.contains(r.date))
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.iter().map(|r| r.date).min()?;
        let last = self.records.iter().map(|r| r.date).max()?;
        Some((first, last))
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.records.iter().any(|r| r.keyword == keyword)
    }

    pub fn has_business(&self, business: &str) -> bool {
        self.records.iter().any(|r| r.business_name == business)
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Long form used in dataset headers, e.g. `Jan 5, 2024`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Keyword,
    Business,
    Comparison,
}

/// What the user is currently looking at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub view: ViewMode,
    pub keyword: Option<String>,
    pub business: Option<String>,
    pub primary: Option<String>,
    pub competitor: Option<String>,
}

/// Dataset plus selections, the full state of one tracking session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub dataset: Dataset,
    pub selection: Selection,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one upload. When no keyword is selected yet, the first keyword
    /// of the new upload becomes the selection.
    pub fn upload(&mut self, source: &str, text: &str) -> Result<UploadBatch> {
        let batch = match self.dataset.ingest(source, text) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(source, error = %err, "upload rejected; keeping existing data");
                return Err(err);
            }
        };

        if self.selection.keyword.is_none() {
            self.selection.keyword = self
                .dataset
                .records_in(&batch)
                .iter()
                .map(|r| r.keyword.as_str())
                .find(|k| !k.is_empty())
                .map(str::to_string);
        }

        Ok(batch)
    }

    pub fn clear(&mut self) {
        self.dataset.clear();
        self.selection = Selection {
            view: self.selection.view,
            ..Selection::default()
        };
    }

    pub fn set_view(&mut self, view: ViewMode) {
        self.selection.view = view;
    }

    pub fn select_keyword(&mut self, keyword: Option<String>) {
        self.selection.keyword = keyword;
    }

    pub fn select_business(&mut self, business: Option<String>) {
        self.selection.business = business;
    }

    /// Picking a primary client that is also the competitor clears the
    /// competitor.
    pub fn select_primary(&mut self, primary: Option<String>) {
        if primary.is_some() && primary == self.selection.competitor {
            self.selection.competitor = None;
        }
        self.selection.primary = primary;
    }

    /// Returns `false`, leaving the selection untouched, when the name is not
    /// one of [`Session::competitor_options`].
    #[must_use]
    pub fn select_competitor(&mut self, competitor: Option<String>) -> bool {
        if let Some(name) = &competitor {
            if !self.competitor_options().contains(name) {
                return false;
            }
        }
        self.selection.competitor = competitor;
        true
    }

    /// Businesses offered as competitors: everyone except the primary client.
    pub fn competitor_options(&self) -> Vec<String> {
        self.dataset
            .businesses()
            .into_iter()
            .filter(|b| Some(b) != self.selection.primary.as_ref())
            .collect()
    }
}
