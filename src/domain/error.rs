//! Domain error types.

/// Top-level error type for slopetrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("data format error on record {line}: {reason}")]
    DataFormat { line: usize, reason: String },

    #[error("malformed series: gave up after {iterations} clock iterations")]
    MalformedSeries { iterations: usize },

    #[error("no historical data at {timestamp}")]
    NoData { timestamp: String },

    #[error("invalid order configuration for order {order_id}: {reason}")]
    InvalidOrderConfig { order_id: String, reason: String },

    #[error("order {order_id} not found")]
    OrderNotFound { order_id: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

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

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config_missing(section: &str, key: &str) -> Self {
        TraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Report { .. } => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::DataSource { .. }
            | TraderError::DataFormat { .. }
            | TraderError::MalformedSeries { .. } => 3,
            TraderError::InvalidOrderConfig { .. } | TraderError::OrderNotFound { .. } => 4,
            TraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
