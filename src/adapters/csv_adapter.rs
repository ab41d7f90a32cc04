//! CSV file bar adapter.
//!
//! One `CODE_MARKET.csv` per instrument with a
//! `date,open,high,low,close,volume` header, plus an optional `tags.csv` of
//! `code,tag` rows. Writes rewrite whole files, oldest bar first.

use crate::domain::candlestick::Candlestick;
use crate::domain::error::StocksimError;
use crate::ports::bar_port::BarPort;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const TAGS_FILE: &str = "tags.csv";
const STICK_HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn column<'r>(record: &'r csv::StringRecord, index: usize, name: &str) -> Result<&'r str, StocksimError> {
    record.get(index).ok_or_else(|| StocksimError::Database {
        reason: format!("missing {name} column"),
    })
}

fn price(record: &csv::StringRecord, index: usize, name: &str) -> Result<Decimal, StocksimError> {
    let raw = column(record, index, name)?;
    Decimal::from_str(raw.trim()).map_err(|e| StocksimError::Database {
        reason: format!("invalid {name} value '{raw}': {e}"),
    })
}

fn write_error(path: &Path, e: impl std::fmt::Display) -> StocksimError {
    StocksimError::Database {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_rows<I, R>(path: &Path, header: &[&str], rows: I) -> Result<(), StocksimError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut wtr = csv::Writer::from_path(path).map_err(|e| write_error(path, e))?;
    wtr.write_record(header).map_err(|e| write_error(path, e))?;
    for row in rows {
        wtr.write_record(row).map_err(|e| write_error(path, e))?;
    }
    wtr.flush().map_err(|e| write_error(path, e))
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn ensure_base(&self) -> Result<(), StocksimError> {
        fs::create_dir_all(&self.base_path).map_err(|e| write_error(&self.base_path, e))
    }

    /// Every `(code, tag)` row of `tags.csv`.
    fn tag_rows(&self) -> Result<Vec<(String, String)>, StocksimError> {
        let path = self.base_path.join(TAGS_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&path).map_err(|e| StocksimError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StocksimError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;
            rows.push((
                column(&record, 0, "code")?.trim().to_string(),
                column(&record, 1, "tag")?.trim().to_string(),
            ));
        }
        Ok(rows)
    }

    fn csv_path(&self, code: &str, market: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, market))
    }

    /// Codes carrying any of `tags`, from `tags.csv`. No file means no tags.
    fn tagged_codes(&self, tags: &[String]) -> Result<HashSet<String>, StocksimError> {
        Ok(self
            .tag_rows()?
            .into_iter()
            .filter(|(_, tag)| tags.contains(tag))
            .map(|(code, _)| code)
            .collect())
    }
}

impl BarPort for CsvAdapter {
    fn get(
        &self,
        code: &str,
        market: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candlestick>, StocksimError> {
        let path = self.csv_path(code, market);
        if !path.exists() {
            return Err(StocksimError::NoData {
                code: code.to_string(),
                market: market.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| StocksimError::Database {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut sticks = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StocksimError::Database {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = column(&record, 0, "date")?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                StocksimError::Database {
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            if date < from || date > to {
                continue;
            }

            let volume_str = column(&record, 5, "volume")?;
            let volume: i64 = volume_str.trim().parse().map_err(|e| StocksimError::Database {
                reason: format!("invalid volume value '{volume_str}': {e}"),
            })?;

            sticks.push(Candlestick::new(
                code,
                market,
                date,
                price(&record, 1, "open")?,
                price(&record, 2, "high")?,
                price(&record, 3, "low")?,
                price(&record, 4, "close")?,
                volume,
            ));
        }

        sticks.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(sticks)
    }

    fn list_codes(&self, market: &str, tags: &[String]) -> Result<Vec<String>, StocksimError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StocksimError::Database {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let suffix = format!("_{}.csv", market);
        let tagged = if tags.is_empty() {
            None
        } else {
            Some(self.tagged_codes(tags)?)
        };
        let mut codes = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StocksimError::Database {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(code) = name_str.strip_suffix(&suffix) {
                if tagged.as_ref().is_none_or(|t| t.contains(code)) {
                    codes.push(code.to_string());
                }
            }
        }

        codes.sort();
        Ok(codes)
    }

    fn save_sticks(&self, sticks: &[Candlestick]) -> Result<(), StocksimError> {
        self.ensure_base()?;
        let mut grouped: BTreeMap<(&str, &str), Vec<&Candlestick>> = BTreeMap::new();
        for stick in sticks {
            grouped
                .entry((stick.code.as_str(), stick.market.as_str()))
                .or_default()
                .push(stick);
        }

        for ((code, market), incoming) in grouped {
            let stored = match self.get(code, market, NaiveDate::MIN, NaiveDate::MAX) {
                Ok(stored) => stored,
                Err(StocksimError::NoData { .. }) => Vec::new(),
                Err(e) => return Err(e),
            };
            let mut by_date: BTreeMap<NaiveDate, Candlestick> =
                stored.into_iter().map(|s| (s.date, s)).collect();
            for stick in incoming {
                by_date.insert(stick.date, stick.clone());
            }

            let path = self.csv_path(code, market);
            let rows = by_date.values().map(|s| {
                [
                    s.date.format("%Y-%m-%d").to_string(),
                    s.open.to_string(),
                    s.high.to_string(),
                    s.low.to_string(),
                    s.close.to_string(),
                    s.volume.to_string(),
                ]
            });
            write_rows(&path, &STICK_HEADER, rows)?;
        }
        Ok(())
    }

    /// `tags.csv` has no market column, so tags apply to the code on every market.
    fn save_tags(&self, code: &str, _market: &str, tags: &[String]) -> Result<(), StocksimError> {
        self.ensure_base()?;
        let mut rows: Vec<(String, String)> = self
            .tag_rows()?
            .into_iter()
            .filter(|(own, _)| own != code)
            .collect();
        rows.extend(tags.iter().map(|tag| (code.to_string(), tag.clone())));

        let path = self.base_path.join(TAGS_FILE);
        write_rows(&path, &["code", "tag"], rows.iter().map(|(c, t)| [c.as_str(), t.as_str()]))
    }
}
