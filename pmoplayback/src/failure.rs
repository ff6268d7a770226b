//! Failure taxonomy for media handles and the fallback strategy attached to
//! each kind.

use std::fmt;

use serde::Serialize;

/// Classification of a load or playback failure reported by a media handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    FormatUnsupported,
    DecodeError,
    Aborted,
    Unknown,
}

/// What the controller does with the source/format cursor after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Keep the current source and format, wait for the network to recover.
    WaitSameSource,
    /// Try the next format of the current source, then the next source.
    NextFormat,
    /// Consider the current source corrupt and move to the next one.
    NextSource,
    /// Reload the same source and format unchanged.
    Reload,
}

impl FailureKind {
    /// Maps a media element error code (`MEDIA_ERR_*`) to a failure kind.
    pub fn from_native_code(code: u16) -> Self {
        match code {
            1 => FailureKind::Aborted,
            2 => FailureKind::Network,
            3 => FailureKind::DecodeError,
            4 => FailureKind::FormatUnsupported,
            _ => FailureKind::Unknown,
        }
    }

    pub fn strategy(self) -> FallbackStrategy {
        match self {
            FailureKind::Network => FallbackStrategy::WaitSameSource,
            FailureKind::FormatUnsupported => FallbackStrategy::NextFormat,
            FailureKind::DecodeError => FallbackStrategy::NextSource,
            FailureKind::Aborted | FailureKind::Unknown => FallbackStrategy::Reload,
        }
    }

    /// Short title shown to the listener.
    pub fn title(self) -> &'static str {
        match self {
            FailureKind::Network => "Network Error",
            FailureKind::FormatUnsupported => "Format Not Supported",
            FailureKind::DecodeError => "Audio Decode Error",
            FailureKind::Aborted => "Loading Cancelled",
            FailureKind::Unknown => "Unknown Error",
        }
    }

    pub fn details(self) -> &'static str {
        match self {
            FailureKind::Network => "Please check your network connection and try again",
            FailureKind::FormatUnsupported => {
                "This audio format is not supported or the source is invalid"
            }
            FailureKind::DecodeError => "Audio file might be corrupted or format is not supported",
            FailureKind::Aborted => "Audio loading was interrupted by user or system",
            FailureKind::Unknown => "An unknown error occurred",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Structured error kept as `last_error` in the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionError {
    pub kind: FailureKind,
    pub human_message: String,
    pub detail: String,
    pub native_code: Option<u16>,
}

impl SessionError {
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            human_message: kind.title().to_string(),
            detail: kind.details().to_string(),
            native_code: None,
        }
    }

    /// Error built from a native media error code.
    pub fn from_native_code(code: u16) -> Self {
        Self {
            native_code: Some(code),
            ..Self::new(FailureKind::from_native_code(code))
        }
    }

    /// Replaces the generic detail text with a backend-specific one.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn offline() -> Self {
        Self::new(FailureKind::Network).with_detail("No Network Connection")
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.native_code {
            Some(code) => write!(f, "{} (code {}): {}", self.human_message, code, self.detail),
            None => write!(f, "{}: {}", self.human_message, self.detail),
        }
    }
}
