use crate::types::ModeType;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RotoError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device timeout")]
    Timeout,
    #[error("device not connected")]
    NotConnected,
    #[error("device did not confirm mode {mode} within {waited_ms} ms")]
    ModeConfirmTimeout { mode: ModeType, waited_ms: u64 },
    #[error("mode {0} cannot be commanded")]
    InvalidMode(ModeType),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing device opener")]
    MissingOpener,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
