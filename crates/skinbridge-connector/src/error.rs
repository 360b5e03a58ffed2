use std::path::PathBuf;

use thiserror::Error;

use skinbridge_bridge::BridgeError;
use skinbridge_overlay::HostError;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
