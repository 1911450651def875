use thiserror::Error;

use zpd_algo::ZpdError;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },

    #[error(transparent)]
    Zpd(#[from] ZpdError),
}

impl From<zpd_algo::ConfigurationError> for SimError {
    fn from(err: zpd_algo::ConfigurationError) -> Self {
        Self::Zpd(err.into())
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
