//! Error types for the radio core.

use thiserror::Error;

/// Failures reported by an audio output device.
///
/// The playback engine never propagates these to its caller; they are logged
/// and the engine keeps its play intent.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No output device could be opened
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    /// The device refused to start playback (e.g. autoplay policy)
    #[error("playback rejected: {0}")]
    Rejected(String),

    /// The source cannot be played by this backend
    #[error("unsupported source '{0}'")]
    Unsupported(String),

    /// The source could not be decoded
    #[error("cannot decode '{uri}': {reason}")]
    Decode { uri: String, reason: String },

    /// Seeking failed
    #[error("seek failed: {0}")]
    Seek(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A schedule record that cannot be used, detected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("entry {entry_id}: invalid time '{value}', expected HH:MM or HH:MM:SS")]
    MalformedTime { entry_id: String, value: String },

    #[error("entry {entry_id}: start {start} is not before end {end}")]
    InvertedWindow {
        entry_id: String,
        start: String,
        end: String,
    },

    #[error("entry {entry_id}: day_of_week {day} out of range 0-6")]
    InvalidDay { entry_id: String, day: i64 },
}

/// Errors loading the track/schedule catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read tags from '{path}': {reason}")]
    Tags { path: String, reason: String },
}

/// Errors persisting the radio configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}
