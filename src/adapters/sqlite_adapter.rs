//! SQLite bar adapter.
//!
//! Prices are stored as TEXT so decimals survive the round trip unchanged.

use crate::domain::candlestick::Candlestick;
use crate::domain::error::StocksimError;
use crate::ports::bar_port::BarPort;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_STICKS: &str = "SELECT code, market, date, open, high, low, close, volume, patched
                             FROM candlestick";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> StocksimError {
    StocksimError::Database {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> StocksimError {
    StocksimError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_error<E>(index: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
}

fn read_stick(row: &rusqlite::Row<'_>) -> rusqlite::Result<Candlestick> {
    let decimal = |index: usize| -> rusqlite::Result<Decimal> {
        let text: String = row.get(index)?;
        Decimal::from_str(&text).map_err(|e| conversion_error(index, e))
    };
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| conversion_error(2, e))?;

    let code: String = row.get(0)?;
    let market: String = row.get(1)?;
    let mut stick = Candlestick::new(
        &code,
        &market,
        date,
        decimal(3)?,
        decimal(4)?,
        decimal(5)?,
        decimal(6)?,
        row.get(7)?,
    );
    stick.patched = row.get(8)?;
    Ok(stick)
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StocksimError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| StocksimError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, StocksimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>, StocksimError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), StocksimError> {
        let conn = self.connection()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS candlestick (
                code TEXT NOT NULL,
                market TEXT NOT NULL,
                date TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                patched INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (code, market, date)
            );
            CREATE TABLE IF NOT EXISTS tag (
                code TEXT NOT NULL,
                market TEXT NOT NULL,
                name TEXT NOT NULL,
                PRIMARY KEY (code, market, name)
            );
            CREATE INDEX IF NOT EXISTS idx_candlestick_market ON candlestick(market);
            CREATE INDEX IF NOT EXISTS idx_tag_name ON tag(name);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    fn query_sticks(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Candlestick>, StocksimError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let rows = stmt.query_map(args, read_stick).map_err(query_error)?;

        let mut sticks = Vec::new();
        for row in rows {
            sticks.push(row.map_err(query_error)?);
        }
        Ok(sticks)
    }
}

impl BarPort for SqliteAdapter {
    fn get(
        &self,
        code: &str,
        market: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candlestick>, StocksimError> {
        let from_str = from.format(DATE_FORMAT).to_string();
        let to_str = to.format(DATE_FORMAT).to_string();
        self.query_sticks(
            &format!(
                "{SELECT_STICKS}
                 WHERE code = ?1 AND market = ?2 AND date >= ?3 AND date <= ?4
                 ORDER BY date DESC"
            ),
            params![code, market, from_str, to_str],
        )
    }

    fn list_codes(&self, market: &str, tags: &[String]) -> Result<Vec<String>, StocksimError> {
        let conn = self.connection()?;

        let query = if tags.is_empty() {
            "SELECT DISTINCT code FROM candlestick WHERE market = ?1 ORDER BY code".to_string()
        } else {
            let placeholders: Vec<String> = (0..tags.len()).map(|i| format!("?{}", i + 2)).collect();
            format!(
                "SELECT DISTINCT c.code FROM candlestick c
                 JOIN tag t ON t.code = c.code AND t.market = c.market
                 WHERE c.market = ?1 AND t.name IN ({})
                 ORDER BY c.code",
                placeholders.join(", ")
            )
        };

        let mut stmt = conn.prepare(&query).map_err(query_error)?;
        let args = std::iter::once(market).chain(tags.iter().map(String::as_str));
        let rows = stmt
            .query_map(params_from_iter(args), |row| row.get(0))
            .map_err(query_error)?;

        let mut codes = Vec::new();
        for row in rows {
            codes.push(row.map_err(query_error)?);
        }
        Ok(codes)
    }

    fn save_sticks(&self, sticks: &[Candlestick]) -> Result<(), StocksimError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;

        for stick in sticks {
            tx.execute(
                "INSERT OR REPLACE INTO candlestick
                 (code, market, date, open, high, low, close, volume, patched)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    stick.code,
                    stick.market,
                    stick.date.format(DATE_FORMAT).to_string(),
                    stick.open.to_string(),
                    stick.high.to_string(),
                    stick.low.to_string(),
                    stick.close.to_string(),
                    stick.volume,
                    stick.patched,
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn save_tags(&self, code: &str, market: &str, tags: &[String]) -> Result<(), StocksimError> {
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(query_error)?;

        tx.execute(
            "DELETE FROM tag WHERE code = ?1 AND market = ?2",
            params![code, market],
        )
        .map_err(query_error)?;
        for tag in tags {
            tx.execute(
                "INSERT OR IGNORE INTO tag (code, market, name) VALUES (?1, ?2, ?3)",
                params![code, market, tag],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }

    fn get_window(
        &self,
        code: Option<&str>,
        market: &str,
        tags: &[String],
        limit: usize,
        to_date: NaiveDate,
    ) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
        let codes = match code {
            Some(code) => vec![code.to_string()],
            None => self.list_codes(market, tags)?,
        };
        let to_str = to_date.format(DATE_FORMAT).to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut result = BTreeMap::new();
        for code in codes {
            let sticks = self.query_sticks(
                &format!(
                    "{SELECT_STICKS}
                     WHERE code = ?1 AND market = ?2 AND date <= ?3
                     ORDER BY date DESC LIMIT ?4"
                ),
                params![code, market, to_str, limit],
            )?;
            if !sticks.is_empty() {
                result.insert(code, sticks);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_decimal(&self, _section: &str, _key: &str, default: Decimal) -> Decimal {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn stick(code: &str, d: u32, close: Decimal) -> Candlestick {
        Candlestick::new(code, "NYSE", date(d), close, close + dec!(1), close - dec!(1), close, 1000)
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .save_sticks(&[
                stick("IBM", 1, dec!(100.5)),
                stick("IBM", 2, dec!(101.123456)),
                stick("IBM", 3, dec!(102)),
                stick("KO", 1, dec!(60)),
            ])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteAdapter::from_config(&EmptyConfig);
        match result {
            Err(StocksimError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn get_returns_exact_prices_newest_first() {
        let adapter = seeded();
        let sticks = adapter.get("IBM", "NYSE", date(1), date(3)).unwrap();

        assert_eq!(sticks.len(), 3);
        assert_eq!(sticks[0].date, date(3));
        assert_eq!(sticks[1].close, dec!(101.123456));
        assert_eq!(sticks[2].high, dec!(101.5));
        assert_eq!(sticks[2].volume, 1000);
        assert!(!sticks[0].patched);
    }

    #[test]
    fn get_filters_range() {
        let adapter = seeded();
        let sticks = adapter.get("IBM", "NYSE", date(2), date(2)).unwrap();
        assert_eq!(sticks.len(), 1);
        assert!(adapter.get("IBM", "NASDAQ", date(1), date(3)).unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_same_day() {
        let adapter = seeded();
        let mut patched = stick("IBM", 3, dec!(51));
        patched.patched = true;
        adapter.save_sticks(&[patched]).unwrap();

        let sticks = adapter.get("IBM", "NYSE", date(3), date(3)).unwrap();
        assert_eq!(sticks.len(), 1);
        assert_eq!(sticks[0].close, dec!(51));
        assert!(sticks[0].patched);
    }

    #[test]
    fn list_codes_with_and_without_tags() {
        let adapter = seeded();
        adapter.save_tags("IBM", "NYSE", &["tech".to_string()]).unwrap();
        adapter
            .save_tags("KO", "NYSE", &["staples".to_string(), "dividend".to_string()])
            .unwrap();

        assert_eq!(adapter.list_codes("NYSE", &[]).unwrap(), vec!["IBM", "KO"]);
        assert_eq!(adapter.list_codes("NYSE", &["tech".to_string()]).unwrap(), vec!["IBM"]);
        assert_eq!(
            adapter
                .list_codes("NYSE", &["dividend".to_string(), "tech".to_string()])
                .unwrap(),
            vec!["IBM", "KO"]
        );
        assert!(adapter.list_codes("NYSE", &["energy".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn save_tags_replaces_previous() {
        let adapter = seeded();
        adapter.save_tags("IBM", "NYSE", &["tech".to_string()]).unwrap();
        adapter.save_tags("IBM", "NYSE", &["hardware".to_string()]).unwrap();
        assert!(adapter.list_codes("NYSE", &["tech".to_string()]).unwrap().is_empty());
    }

    #[test]
    fn get_window_limits_and_bounds() {
        let adapter = seeded();
        let windows = adapter.get_window(None, "NYSE", &[], 2, date(2)).unwrap();

        assert_eq!(windows["IBM"].len(), 2);
        assert_eq!(windows["IBM"][0].date, date(2));
        assert_eq!(windows["KO"].len(), 1);

        let single = adapter.get_window(Some("KO"), "NYSE", &[], 10, date(3)).unwrap();
        assert_eq!(single.keys().collect::<Vec<_>>(), vec!["KO"]);
    }

    #[test]
    fn get_many_over_market() {
        let adapter = seeded();
        let all = adapter.get_many("NYSE", &[], date(1), date(31)).unwrap();
        assert_eq!(all["IBM"].len(), 3);
        assert_eq!(all["KO"].len(), 1);
    }
}
