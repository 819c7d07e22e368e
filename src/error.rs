use thiserror::Error as ThisError;

use crate::dnrgb::DnrgbError;

#[derive(ThisError, Debug)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind sensor socket on {addr}: {source}")]
    SensorBind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("DNRGB encoding failed: {0}")]
    Dnrgb(#[from] DnrgbError),

    #[error("WLED request failed: {0}")]
    Wled(#[from] reqwest::Error),

    #[error("Restart action failed: {0}")]
    Restart(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HubError>;
