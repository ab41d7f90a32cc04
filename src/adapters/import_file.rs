//! Readers for bulk import files.
//!
//! Bar files carry a `code,market,date,open,high,low,close,volume` header.
//! Dates may use `-` or `/` and may carry a trailing time. Tag files are
//! tab separated `MARKET:CODE<TAB>tag1,tag2` lines without a header.

use crate::domain::candlestick::Candlestick;
use crate::domain::error::StocksimError;
use crate::domain::store::InstrumentTags;
use crate::domain::universe::parse_tags;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

fn read_error(path: &Path, e: impl std::fmt::Display) -> StocksimError {
    StocksimError::Database {
        reason: format!("failed to read {}: {}", path.display(), e),
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, name: &str, line: u64) -> Result<&'r str, StocksimError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| StocksimError::Database {
            reason: format!("line {line}: missing {name} column"),
        })
}

fn price(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<Decimal, StocksimError> {
    let raw = field(record, index, name, line)?;
    Decimal::from_str(raw).map_err(|e| StocksimError::Database {
        reason: format!("line {line}: invalid {name} '{raw}': {e}"),
    })
}

/// `2024-01-31`, `2024/1/31` or `2024/01/31 00:00:00`.
fn parse_import_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw
        .split(|c: char| matches!(c, ' ' | '-' | '/' | ':' | 'T'))
        .filter(|p| !p.is_empty());
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn read_bar_file(path: &Path) -> Result<Vec<Candlestick>, StocksimError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|e| read_error(path, e))?;
    let mut sticks = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| read_error(path, e))?;
        let line = index as u64 + 2;

        let raw_date = field(&record, 2, "date", line)?;
        let date = parse_import_date(raw_date).ok_or_else(|| StocksimError::Database {
            reason: format!("line {line}: invalid date '{raw_date}'"),
        })?;
        let raw_volume = field(&record, 7, "volume", line)?;
        let volume: i64 = raw_volume.parse().map_err(|e| StocksimError::Database {
            reason: format!("line {line}: invalid volume '{raw_volume}': {e}"),
        })?;

        sticks.push(Candlestick::new(
            &field(&record, 0, "code", line)?.to_uppercase(),
            field(&record, 1, "market", line)?,
            date,
            price(&record, 3, "open", line)?,
            price(&record, 4, "high", line)?,
            price(&record, 5, "low", line)?,
            price(&record, 6, "close", line)?,
            volume,
        ));
    }
    Ok(sticks)
}

pub fn read_tag_file(path: &Path) -> Result<Vec<InstrumentTags>, StocksimError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| read_error(path, e))?;

    let mut entries = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| read_error(path, e))?;
        let line = index as u64 + 1;
        let key = field(&record, 0, "instrument", line)?;
        if key.is_empty() {
            continue;
        }
        let (market, code) = key.split_once(':').ok_or_else(|| StocksimError::Database {
            reason: format!("line {line}: expected MARKET:CODE, got '{key}'"),
        })?;
        entries.push(InstrumentTags {
            code: code.trim().to_uppercase(),
            market: market.trim().to_string(),
            tags: record.get(1).map(parse_tags).unwrap_or_default(),
        });
    }
    Ok(entries)
}
