use crate::failure::SessionError;
use crate::model::{PlaybackStatus, SessionSnapshot};
use crate::sources::{FormatList, SourceCursor, SourceList};

/// State of one playback attempt sequence, from first load to disposal.
#[derive(Clone, Debug)]
pub struct PlaybackSession {
    sources: SourceList,
    pub(crate) cursor: SourceCursor,
    /// Cursor chosen by the fallback policy for the pending retry.
    pub(crate) next_cursor: Option<SourceCursor>,
    pub(crate) status: PlaybackStatus,
    pub(crate) retry_count: u32,
    pub(crate) volume: f32,
    pub(crate) position: f64,
    pub(crate) duration: Option<f64>,
    pub(crate) is_online: bool,
    pub(crate) last_error: Option<SessionError>,
    /// Play was requested, implicitly (autoplay) or by the listener.
    pub(crate) play_requested: bool,
    /// The live handle reported it can play.
    pub(crate) ready: bool,
    pub(crate) ended: bool,
    /// Position to restore once a reloaded handle is ready.
    pub(crate) resume_position: Option<f64>,
}

impl PlaybackSession {
    pub(crate) fn new(sources: SourceList, volume: f32, is_online: bool, autoplay: bool) -> Self {
        Self {
            sources,
            cursor: SourceCursor::default(),
            next_cursor: None,
            status: PlaybackStatus::Idle,
            retry_count: 0,
            volume,
            position: 0.0,
            duration: None,
            is_online,
            last_error: None,
            play_requested: autoplay,
            ready: false,
            ended: false,
            resume_position: None,
        }
    }

    pub fn sources(&self) -> &SourceList {
        &self.sources
    }

    pub fn cursor(&self) -> SourceCursor {
        self.cursor
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub fn current_uri(&self, formats: &FormatList) -> Option<String> {
        self.cursor.uri(&self.sources, formats)
    }

    /// Back to the primary source with a fresh retry budget.
    pub(crate) fn rewind(&mut self) {
        self.cursor = SourceCursor::default();
        self.next_cursor = None;
        self.retry_count = 0;
        self.last_error = None;
        self.resume_position = None;
        self.reset_media_state();
    }

    /// Forgets everything learned from the previous handle.
    pub(crate) fn reset_media_state(&mut self) {
        self.ready = false;
        self.ended = false;
        self.position = 0.0;
        self.duration = None;
    }

    /// Stores a position reported by the handle, bounded by the duration.
    pub(crate) fn update_position(&mut self, position: f64, duration: Option<f64>) {
        if let Some(duration) = duration.filter(|d| d.is_finite() && *d >= 0.0) {
            self.duration = Some(duration);
        }
        let position = if position.is_finite() {
            position.max(0.0)
        } else {
            0.0
        };
        self.position = match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
    }

    pub(crate) fn snapshot(&self, formats: &FormatList, max_retries: u32) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            uri: self.current_uri(formats),
            source_index: self.cursor.source_index,
            format_index: self.cursor.format_index,
            retry_count: self.retry_count,
            max_retries,
            volume: self.volume,
            position: self.position,
            duration: self.duration,
            is_online: self.is_online,
            last_error: self.last_error.clone(),
        }
    }
}
