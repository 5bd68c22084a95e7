// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// These constants provide a single source of truth for error codes
/// shared between the engine, the CLI, and downstream consumers.
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Audio engine is already running
    pub const ALREADY_RUNNING: i32 = 1001;

    /// Audio engine is not running
    pub const NOT_RUNNING: i32 = 1002;

    /// No audio output device is available
    pub const NO_OUTPUT_DEVICE: i32 = 1003;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1004;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1005;

    /// Output sample format is not supported
    pub const UNSUPPORTED_FORMAT: i32 = 1006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1007;

    /// Tempo value is invalid (must be > 0)
    pub const TEMPO_INVALID: i32 = 1008;
}

/// Log an audio error with structured context
///
/// Logs include the numeric error code for programmatic handling, the
/// component where the error occurred, and a human-readable message.
/// Logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover audio engine operations including initialization,
/// stream management, and hardware access.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Audio engine is already running
    AlreadyRunning,

    /// Audio engine is not running
    NotRunning,

    /// No audio output device was found on this host
    NoOutputDevice,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Output sample format is not supported
    UnsupportedFormat { format: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Tempo value is invalid (must be > 0)
    TempoInvalid { bpm: u32 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::NoOutputDevice => AudioErrorCodes::NO_OUTPUT_DEVICE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::TempoInvalid { .. } => AudioErrorCodes::TEMPO_INVALID,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Audio engine already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => "Audio engine not running. Call start() first.".to_string(),
            AudioError::NoOutputDevice => {
                "No audio output device found on this host.".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::UnsupportedFormat { format } => {
                format!("Unsupported output sample format: {}", format)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::TempoInvalid { bpm } => {
                format!("Tempo must be greater than 0 BPM (got {})", bpm)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
