//! Domain error types.

/// Top-level error type for twscreen.
///
/// Config variants are fatal to a scan and surface before any work starts.
/// `DataFetch`, `NoData` and `InsufficientData` are per-ticker soft failures:
/// the pipeline records them and moves on.
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
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

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("failed to fetch {ticker}: {reason}")]
    DataFetch { ticker: String, reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("universe error: {reason}")]
    Universe { reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScreenerError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        ScreenerError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ScreenerError::ConfigParse { .. }
                | ScreenerError::ConfigMissing { .. }
                | ScreenerError::ConfigInvalid { .. }
                | ScreenerError::UnknownStrategy { .. }
        )
    }
}

impl From<&ScreenerError> for std::process::ExitCode {
    fn from(err: &ScreenerError) -> Self {
        let code: u8 = match err {
            ScreenerError::Io(_) | ScreenerError::ThreadPool(_) => 1,
            ScreenerError::ConfigParse { .. }
            | ScreenerError::ConfigMissing { .. }
            | ScreenerError::ConfigInvalid { .. }
            | ScreenerError::UnknownStrategy { .. } => 2,
            ScreenerError::DataFetch { .. } | ScreenerError::Universe { .. } => 3,
            ScreenerError::NoData { .. } | ScreenerError::InsufficientData { .. } => 5,
            ScreenerError::Csv(_) => 6,
        };
        std::process::ExitCode::from(code)
    }
}
