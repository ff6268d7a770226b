use std::time::Duration;

use crate::errors::{PlaybackError, Result};
use crate::sources::FormatList;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(6),
];
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Tunables of the playback controller.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSettings {
    /// Automatic retries allowed before the session is marked failed.
    pub max_retries: u32,
    /// Delay before retry `n` (0-based). The last entry is reused past the end.
    pub retry_delays: Vec<Duration>,
    pub formats: FormatList,
    pub default_volume: f32,
    /// Start playing as soon as the first handle is ready.
    pub autoplay: bool,
    /// Restart the track when it ends.
    pub looping: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delays: DEFAULT_RETRY_DELAYS.to_vec(),
            formats: FormatList::default(),
            default_volume: DEFAULT_VOLUME,
            autoplay: true,
            looping: true,
        }
    }
}

impl PlayerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.retry_delays.is_empty() {
            return Err(PlaybackError::invalid_setting(
                "retry_delays",
                "at least one delay is required",
            ));
        }
        if self.retry_delays.windows(2).any(|w| w[1] < w[0]) {
            return Err(PlaybackError::invalid_setting(
                "retry_delays",
                "delays must be non-decreasing",
            ));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(PlaybackError::invalid_setting(
                "default_volume",
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Delay to wait before the retry following `retry_count` attempts.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let index = (retry_count as usize).min(self.retry_delays.len().saturating_sub(1));
        self.retry_delays
            .get(index)
            .copied()
            .unwrap_or(DEFAULT_RETRY_DELAYS[0])
    }
}
