use thiserror::Error;

/// Errors raised while setting up or driving a playback controller.
///
/// Media failures (network loss, unsupported format, ...) are not reported
/// through this type: they become part of the session state as a
/// [`SessionError`](crate::SessionError).
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Source list is empty")]
    EmptySourceList,
    #[error("Format list is empty")]
    EmptyFormatList,
    #[error("Invalid player setting '{0}': {1}")]
    InvalidSetting(String, String),
    #[error("Media backend error: {0}")]
    Backend(String),
    #[error("Track source error: {0}")]
    TrackSource(String),
    #[error("Playback runtime is not running")]
    RuntimeStopped,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlaybackError {
    pub fn invalid_setting(name: &str, reason: &str) -> Self {
        PlaybackError::InvalidSetting(name.to_string(), reason.to_string())
    }

    pub fn backend(message: &str) -> Self {
        PlaybackError::Backend(message.to_string())
    }

    pub fn track_source(message: &str) -> Self {
        PlaybackError::TrackSource(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
