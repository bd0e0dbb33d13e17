// Error handling for the sound pool

use std::fmt;

/// Sound pool error types
#[derive(Debug, Clone)]
pub enum AudioError {
    /// Failed to initialize an output device or worker
    InitializationError(String),

    /// Failed to load a sample
    LoadError(String),

    /// Playback error
    PlaybackError(String),

    /// Operation not valid in the current state
    InvalidState(String),

    /// Audio format not supported
    UnsupportedFormat(String),

    /// Device error (hardware issues)
    DeviceError(String),

    /// IO error, including unresolvable sample sources
    IoError(String),

    /// Decoding error, including stalled decoders
    DecodingError(String),

    /// Network error (size probe / range requests)
    NetworkError(String),

    /// Pool has no free sample slot
    CapacityError(String),

    /// Generic error
    Other(String),
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AudioError::InitializationError(msg) => write!(f, "Initialization error: {}", msg),
            AudioError::LoadError(msg) => write!(f, "Load error: {}", msg),
            AudioError::PlaybackError(msg) => write!(f, "Playback error: {}", msg),
            AudioError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            AudioError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            AudioError::DeviceError(msg) => write!(f, "Device error: {}", msg),
            AudioError::IoError(msg) => write!(f, "IO error: {}", msg),
            AudioError::DecodingError(msg) => write!(f, "Decoding error: {}", msg),
            AudioError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AudioError::CapacityError(msg) => write!(f, "Capacity error: {}", msg),
            AudioError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// Result type alias for sound pool operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;
        match err {
            SymphoniaError::IoError(e) => AudioError::IoError(e.to_string()),
            SymphoniaError::Unsupported(what) => AudioError::UnsupportedFormat(what.to_string()),
            other => AudioError::DecodingError(other.to_string()),
        }
    }
}
