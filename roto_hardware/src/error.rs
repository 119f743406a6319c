use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("hid error: {0}")]
    Hid(String),
    #[error("device read timeout")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
