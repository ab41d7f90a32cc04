//! Configuration validation.
//!
//! Validates every config field before a simulation or ranking runs.

use crate::domain::error::StocksimError;
use crate::domain::invest::InvestRuleType;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim() {
        "csv" => require("data", "csv_path", config).map(|_| ()),
        "sqlite" => {
            if cfg!(not(feature = "sqlite")) {
                return Err(invalid("data", "source", "built without sqlite support"));
            }
            require("sqlite", "path", config).map(|_| ())
        }
        other => Err(invalid(
            "data",
            "source",
            &format!("unknown data source '{other}', expected csv or sqlite"),
        )),
    }
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    validate_rule(config)?;
    validate_simulation_settings(config)
}

/// Everything in `[simulation]` except the rule, for callers that take the
/// rule from elsewhere.
pub fn validate_simulation_settings(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    validate_principal(config)?;
    validate_rule_params(config)?;
    validate_term(config)?;
    validate_today(config)?;
    validate_market(config)?;
    Ok(())
}

/// `unit` of at least 1 and `0 <= losscut_rate < 1`.
pub fn validate_rule_params(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    validate_unit(config)?;
    validate_losscut_rate(config)
}

pub fn validate_commission_config(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let minimum = config.get_decimal("commission", "minimum", Decimal::ZERO);
    let maximum = config.get_decimal("commission", "maximum", Decimal::ZERO);
    let rate = config.get_decimal("commission", "rate", Decimal::ZERO);

    for (key, value) in [("minimum", minimum), ("maximum", maximum), ("rate", rate)] {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(invalid(
                "commission",
                key,
                &format!("{key} must be non-negative"),
            ));
        }
    }
    if minimum > maximum {
        return Err(invalid(
            "commission",
            "minimum",
            "minimum must not exceed maximum",
        ));
    }
    Ok(())
}

pub fn validate_cache_config(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let backend = config
        .get_string("cache", "backend")
        .unwrap_or_else(|| "memory".to_string());
    match backend.trim() {
        "memory" => {}
        "redis" => {
            if cfg!(not(feature = "redis")) {
                return Err(invalid("cache", "backend", "built without redis support"));
            }
            require("cache", "url", config)?;
        }
        other => {
            return Err(invalid(
                "cache",
                "backend",
                &format!("unknown cache backend '{other}', expected memory or redis"),
            ));
        }
    }

    let coefficient = config.get_decimal("cache", "coefficient", Decimal::ONE);
    if coefficient.is_sign_negative() && !coefficient.is_zero() {
        return Err(invalid(
            "cache",
            "coefficient",
            "coefficient must be non-negative",
        ));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` value, reporting the field it came from.
pub fn parse_date(section: &str, key: &str, value: Option<&str>) -> Result<NaiveDate, StocksimError> {
    match value {
        None => Err(StocksimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            invalid(
                section,
                key,
                &format!("invalid {key} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

fn require(section: &str, key: &str, config: &dyn ConfigPort) -> Result<String, StocksimError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(StocksimError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> StocksimError {
    StocksimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_rule(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let rule = require("simulation", "rule", config)?;
    rule.parse::<InvestRuleType>().map(|_| ())
}

fn validate_principal(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_decimal("simulation", "principal", Decimal::ZERO);
    if value <= Decimal::ZERO {
        return Err(invalid(
            "simulation",
            "principal",
            "principal must be positive",
        ));
    }
    Ok(())
}

fn validate_unit(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_int("simulation", "unit", 0);
    if value < 1 {
        return Err(invalid("simulation", "unit", "unit must be at least 1"));
    }
    Ok(())
}

fn validate_losscut_rate(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_decimal("simulation", "losscut_rate", Decimal::ZERO);
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(invalid(
            "simulation",
            "losscut_rate",
            "losscut_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_term(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let value = config.get_int("simulation", "term", 0);
    if value < 1 {
        return Err(invalid("simulation", "term", "term must be at least 1"));
    }
    Ok(())
}

fn validate_today(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    let today = config.get_string("simulation", "today");
    parse_date("simulation", "today", today.as_deref()).map(|_| ())
}

fn validate_market(config: &dyn ConfigPort) -> Result<(), StocksimError> {
    require("simulation", "market", config).map(|_| ())
}
