use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected {attr} value {value:?}")]
    Parse { attr: &'static str, value: String },
    #[error("no battery found under {0:?}")]
    NotFound(PathBuf),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
