use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("insufficient capacity: payload needs {needed} frames, signal provides {available}")]
    InsufficientCapacity { needed: usize, available: usize },

    #[error("signal contains no samples")]
    EmptySignal,

    #[error("invalid payload length: at most {max} bits allowed, got {got}")]
    InvalidPayloadLength { max: usize, got: usize },

    #[error("invalid hex payload: {0}")]
    InvalidHex(String),

    #[error("FFT error: {0}")]
    Fft(String),
}

pub type Result<T> = std::result::Result<T, Error>;
