//! INI file configuration adapter.

use crate::domain::error::StocksimError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StocksimError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| StocksimError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, StocksimError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| StocksimError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    fn parse_decimal(value: &str) -> Option<Decimal> {
        let value = value.trim();
        Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .ok()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_decimal(&self, section: &str, key: &str, default: Decimal) -> Decimal {
        self.config
            .get(section, key)
            .as_deref()
            .and_then(Self::parse_decimal)
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}
