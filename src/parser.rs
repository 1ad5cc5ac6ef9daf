//! Tab-separated rank export parsing.
//!
//! Columns are looked up by header name, so their order in the export does
//! not matter. Only the date and the rank gate whether a line becomes a
//! record; every other field falls back to a default.

use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::models::RankRecord;

pub const COL_DATE: &str = "Date";
pub const COL_KEYWORD: &str = "Keyword";
pub const COL_LOCATION: &str = "Location";
pub const COL_RANK: &str = "Rank";
pub const COL_POSITION: &str = "Position in Pack";
pub const COL_BUSINESS: &str = "Business Name";
pub const COL_RATING: &str = "Google Rating";
pub const COL_RATINGS_COUNT: &str = "Ratings Count";
pub const COL_GLOBAL_VOLUME: &str = "Global Monthly Search Volume";
pub const COL_REGIONAL_VOLUME: &str = "Regional Monthly Search Volume";

pub const UNKNOWN_BUSINESS: &str = "Unknown";

/// Header name to column index. A repeated header keeps its last position.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    width: usize,
    index: HashMap<String, usize>,
}

impl ColumnMap {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut index = HashMap::new();
        for (idx, header) in headers.iter().enumerate() {
            index.insert(header.to_string(), idx);
        }
        Self {
            width: headers.len(),
            index,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn field<'a>(&self, row: &'a StringRecord, name: &str) -> Option<&'a str> {
        self.position(name).and_then(|idx| row.get(idx))
    }
}

/// Result of parsing one upload before it is merged into a dataset.
#[derive(Debug, Clone, Default)]
pub struct ParsedUpload {
    pub records: Vec<RankRecord>,
    pub rejected: usize,
}

pub fn parse_upload(source_name: &str, text: &str) -> Result<ParsedUpload> {
    parse_reader(source_name, text.as_bytes())
}

/// Parse an upload from any byte source. Fields are decoded lossily, so a
/// stray Latin-1 byte in a name never sinks the whole file.
pub fn parse_reader<R: Read>(source_name: &str, input: R) -> Result<ParsedUpload> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(input);

    let mut rows = reader.byte_records();
    let headers = loop {
        match rows.next() {
            None => return Err(TrackerError::EmptyInput),
            Some(row) => {
                let row = decode_lossy(&row?);
                if !is_blank(&row) {
                    break row;
                }
            }
        }
    };
    let columns = ColumnMap::from_headers(&strip_bom(&headers));

    let mut parsed = ParsedUpload::default();
    for row in rows {
        let row = decode_lossy(&row?);
        if is_blank(&row) {
            continue;
        }
        match parse_row(&columns, &row) {
            Some(record) => parsed.records.push(record),
            None => parsed.rejected += 1,
        }
    }

    if parsed.records.is_empty() {
        return Err(TrackerError::NoValidEntries {
            source_name: source_name.to_string(),
        });
    }

    if parsed.rejected > 0 {
        debug!(
            source = source_name,
            rejected = parsed.rejected,
            "skipped lines without a usable date or rank"
        );
    }
    info!(
        source = source_name,
        accepted = parsed.records.len(),
        "parsed upload"
    );

    Ok(parsed)
}

fn decode_lossy(row: &ByteRecord) -> StringRecord {
    row.iter().map(String::from_utf8_lossy).collect()
}

fn is_blank(row: &StringRecord) -> bool {
    row.iter().all(|field| field.is_empty())
}

fn strip_bom(headers: &StringRecord) -> StringRecord {
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            if idx == 0 {
                header.trim_start_matches('\u{feff}')
            } else {
                header
            }
        })
        .collect()
}

/// Turn one data line into a record, or `None` when it must be skipped.
pub fn parse_row(columns: &ColumnMap, row: &StringRecord) -> Option<RankRecord> {
    if row.len() < columns.width() {
        return None;
    }

    let date = normalize_date(columns.field(row, COL_DATE)?)?;
    let rank = columns
        .field(row, COL_RANK)
        .and_then(lenient_int)
        .filter(|rank| *rank >= 1)
        .and_then(|rank| u32::try_from(rank).ok())?;

    let text = |name: &str| columns.field(row, name).unwrap_or_default().to_string();
    let int = |name: &str| columns.field(row, name).and_then(lenient_int).unwrap_or(0);

    let business_name = match columns.field(row, COL_BUSINESS) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_BUSINESS.to_string(),
    };

    Some(RankRecord {
        date,
        keyword: text(COL_KEYWORD),
        location: text(COL_LOCATION),
        rank,
        position_in_pack: int(COL_POSITION),
        business_name,
        google_rating: columns
            .field(row, COL_RATING)
            .and_then(lenient_float)
            .unwrap_or(0.0),
        ratings_count: int(COL_RATINGS_COUNT),
        global_search_volume: int(COL_GLOBAL_VOLUME),
        regional_search_volume: int(COL_REGIONAL_VOLUME),
    })
}

/// Accepts `MM/DD/YYYY` (unpadded allowed) or `YYYY-MM-DD`. A time of day
/// after an ISO date (`2024-01-15 09:30:00`, `2024-01-15T09:30`) is ignored.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').collect();
        if parts.len() != 3 {
            return None;
        }
        let month: u32 = parts[0].trim().parse().ok()?;
        let day: u32 = parts[1].trim().parse().ok()?;
        let year: i32 = parts[2].trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    } else if raw.contains('-') {
        let (date, rest) = NaiveDate::parse_and_remainder(raw, "%Y-%m-%d").ok()?;
        if rest.is_empty() || rest.starts_with(|c: char| c == ' ' || c == 'T') {
            Some(date)
        } else {
            None
        }
    } else {
        None
    }
}

/// Leading-integer parse: `"12"`, `"12 reviews"` and `"3.0"` all read as
/// their integer prefix; anything without leading digits is `None`.
pub fn lenient_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (sign, digits) = split_sign(raw);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}

/// Leading-decimal parse with the same prefix rule as [`lenient_int`].
pub fn lenient_float(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let (sign, rest) = split_sign(raw);
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (idx, c) in rest.char_indices() {
        if c.is_ascii_digit() {
            seen_digit = true;
            end = idx + 1;
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            end = idx + 1;
        } else {
            break;
        }
    }
    if !seen_digit {
        return None;
    }
    rest[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .map(|value| sign as f64 * value)
}

fn split_sign(raw: &str) -> (i64, &str) {
    if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else {
        (1, raw)
    }
}
