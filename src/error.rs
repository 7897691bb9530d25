//! Error types for ZVA

use thiserror::Error;

/// Result type alias for ZVA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ZVA
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container format error (bad capture pattern, CRC mismatch, ...)
    #[error("Format error: {0}")]
    Format(String),

    /// The decoder rejected a packet
    #[error("Codec error: {0}")]
    Codec(String),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid data (serialization failures)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Unsupported or corrupt stream, or an optional decoder capability
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// End of stream
    #[error("End of stream")]
    EndOfStream,

    /// Decoder needs more input before it can produce a picture
    #[error("Try again")]
    TryAgain,

    /// A forward seek ran out of pictures
    #[error("Stream ended at picture {available} before reaching picture {requested}")]
    SeekPastEnd { requested: u64, available: u64 },

    /// A fallible allocation failed
    #[error("Out of memory: could not allocate {bytes} bytes")]
    OutOfMemory { bytes: usize },

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create a codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::Unsupported(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// True for the expected terminal condition of a drained byte source
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }
}

/// Allocate a vector of `len` copies of `value`, reporting failure instead of aborting.
pub(crate) fn try_alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| Error::OutOfMemory {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
    })?;
    v.resize(len, value);
    Ok(v)
}
