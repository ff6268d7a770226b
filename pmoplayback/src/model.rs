use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::failure::SessionError;

/// Logical state of a playback session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stalled,
    Failed,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Stalled => "stalled",
            PlaybackStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Identity of one media handle. Never reused by a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle notification emitted by a media handle.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaEvent {
    pub handle: HandleId,
    pub kind: MediaEventKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MediaEventKind {
    /// Enough data is available to start playback.
    Ready { duration: Option<f64> },
    Progress {
        position: f64,
        duration: Option<f64>,
    },
    /// Buffering halted without a definitive error.
    Stalled,
    Error(SessionError),
    Ended,
    /// The platform refused to start playback (autoplay policy).
    PlayRejected,
}

/// Condition reported to the view when an intent could not be applied or
/// when something happened that has no dedicated status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    NotReady,
    Offline,
    Online,
    AutoplayBlocked,
    RetriesExhausted,
}

/// Events broadcast to view subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEvent {
    StatusChanged {
        status: PlaybackStatus,
    },
    PositionChanged {
        position: f64,
        duration: Option<f64>,
    },
    VolumeChanged {
        volume: f32,
    },
    ErrorChanged {
        error: Option<SessionError>,
    },
    RetryScheduled {
        attempt: u32,
        delay: Duration,
    },
    SourceChanged {
        uri: String,
    },
    Notice(Notice),
    Disposed,
}

/// Synchronous answer to a user intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    NotReady,
    Offline,
    Disposed,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        self == CommandOutcome::Applied
    }
}

/// Read-only view model of the current session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub uri: Option<String>,
    pub source_index: usize,
    pub format_index: usize,
    pub retry_count: u32,
    pub max_retries: u32,
    pub volume: f32,
    pub position: f64,
    pub duration: Option<f64>,
    pub is_online: bool,
    pub last_error: Option<SessionError>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
