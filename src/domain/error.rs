//! Domain error types.
//!
//! Running out of cash or having nothing to close are not errors; those
//! outcomes travel back as flags on the rule result structs.

/// Top-level error type for stocksim.
#[derive(Debug, thiserror::Error)]
pub enum StocksimError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown invest rule type: {name}")]
    UnknownRule { name: String },

    #[error("no data for {code} on {market}")]
    NoData { code: String, market: String },

    #[error("{count} bars differ from stored data, nothing saved")]
    Inconsistent { count: usize },

    #[error("invalid {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&StocksimError> for std::process::ExitCode {
    fn from(err: &StocksimError) -> Self {
        let code: u8 = match err {
            StocksimError::Io(_) => 1,
            StocksimError::ConfigParse { .. }
            | StocksimError::ConfigMissing { .. }
            | StocksimError::ConfigInvalid { .. }
            | StocksimError::InvalidArgument { .. } => 2,
            StocksimError::Database { .. }
            | StocksimError::DatabaseQuery { .. }
            | StocksimError::Cache { .. }
            | StocksimError::Inconsistent { .. } => 3,
            StocksimError::UnknownRule { .. } => 4,
            StocksimError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
