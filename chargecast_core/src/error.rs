use thiserror::Error;

/// Why a sample never reached the estimator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("negative state of charge")]
    NegativeSoc,
    #[error("sample older than the previous one")]
    OutOfOrder,
}

#[derive(Debug, Error, Clone)]
pub enum ChargeError {
    #[error("battery observer error: {0}")]
    Observer(String),
    #[error("persistence error: {0}")]
    Persist(String),
    #[error("sample rejected: {0}")]
    Rejected(RejectReason),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
