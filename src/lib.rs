//! Local pack rank tracking: parse rank-tracker exports, aggregate monthly
//! statistics per keyword and per business, build chart series, and
//! summarize a client against a competitor.

pub mod compare;
pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod parser;
pub mod report;
pub mod snapshot;
pub mod stats;
pub mod timeseries;

pub use config::Config;
pub use dataset::{Dataset, Selection, Session, ViewMode};
pub use error::{Result, TrackerError};
pub use models::{MonthKey, MonthlyStat, RankRecord, TimeSeriesPoint};
pub use snapshot::{Snapshot, ViewRequest};
