//! Candidate URIs for a track and the cursor walking through them.
//!
//! A session owns an immutable [`SourceList`] (primary URI followed by
//! location fallbacks) and a [`FormatList`] of extensions. The
//! [`SourceCursor`] points at one `(source, format)` pair; format index 0
//! always means "the URI as listed".

use rand::seq::IndexedRandom;
use serde::Deserialize;

use crate::errors::{PlaybackError, Result};
use crate::failure::FallbackStrategy;

/// Non-empty ordered list of candidate URIs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceList(Vec<String>);

impl SourceList {
    pub fn new<I, S>(uris: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let uris: Vec<String> = uris
            .into_iter()
            .map(Into::into)
            .filter(|uri| !uri.trim().is_empty())
            .collect();
        if uris.is_empty() {
            return Err(PlaybackError::EmptySourceList);
        }
        Ok(Self(uris))
    }

    pub fn single(uri: impl Into<String>) -> Result<Self> {
        Self::new([uri.into()])
    }

    /// Uses every track listed by `source`, in order.
    pub fn from_track_source(source: &dyn TrackSource) -> Result<Self> {
        Self::new(source.tracks()?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Non-empty ordered list of file extensions tried for each source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatList(Vec<String>);

impl FormatList {
    pub fn new<I, S>(formats: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let formats: Vec<String> = formats
            .into_iter()
            .map(|f| f.into().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
        if formats.is_empty() {
            return Err(PlaybackError::EmptyFormatList);
        }
        Ok(Self(formats))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }
}

impl Default for FormatList {
    fn default() -> Self {
        Self(vec!["mp3".into(), "ogg".into(), "wav".into()])
    }
}

/// Position of the session in the `(source, format)` space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceCursor {
    pub source_index: usize,
    pub format_index: usize,
}

impl SourceCursor {
    pub fn new(source_index: usize, format_index: usize) -> Self {
        Self {
            source_index,
            format_index,
        }
    }

    /// URI to load for this cursor, or `None` if the cursor is out of range.
    pub fn uri(&self, sources: &SourceList, formats: &FormatList) -> Option<String> {
        let source = sources.get(self.source_index)?;
        if self.format_index == 0 {
            return Some(source.to_string());
        }
        let extension = formats.get(self.format_index)?;
        Some(replace_extension(source, extension))
    }

    /// Next cursor to try under `strategy`, `None` when nothing is left.
    ///
    /// `NextFormat` skips formats resolving to the URI as listed, which was
    /// already tried at format index 0.
    pub fn fallback(
        &self,
        strategy: FallbackStrategy,
        sources: &SourceList,
        formats: &FormatList,
    ) -> Option<SourceCursor> {
        match strategy {
            FallbackStrategy::WaitSameSource | FallbackStrategy::Reload => Some(*self),
            FallbackStrategy::NextFormat => {
                let listed = sources
                    .get(self.source_index)
                    .and_then(listed_extension)
                    .map(|ext| ext.to_ascii_lowercase());
                let next_format = (self.format_index + 1..formats.len())
                    .find(|&k| formats.get(k) != listed.as_deref());
                match next_format {
                    Some(k) => Some(SourceCursor::new(self.source_index, k)),
                    None if self.source_index + 1 < sources.len() => {
                        Some(SourceCursor::new(self.source_index + 1, 0))
                    }
                    None => None,
                }
            }
            FallbackStrategy::NextSource => {
                if self.source_index + 1 < sources.len() {
                    Some(SourceCursor::new(self.source_index + 1, self.format_index))
                } else {
                    None
                }
            }
        }
    }
}

/// Splits `uri` into stem, extension of the last path segment and the
/// query/fragment suffix.
///
/// Sources are usually relative paths, which `url::Url` cannot parse without
/// a base, hence the manual split.
fn split_extension(uri: &str) -> (&str, Option<&str>, &str) {
    let split_at = uri.find(['?', '#']).unwrap_or(uri.len());
    let (path, suffix) = uri.split_at(split_at);
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);

    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let at = segment_start + dot;
            (&path[..at], Some(&path[at + 1..]), suffix)
        }
        _ => (path, None, suffix),
    }
}

fn listed_extension(uri: &str) -> Option<&str> {
    split_extension(uri).1.filter(|ext| !ext.is_empty())
}

/// Swaps the extension of the last path segment, keeping query and fragment.
fn replace_extension(uri: &str, extension: &str) -> String {
    let (stem, _, suffix) = split_extension(uri);
    format!("{}.{}{}", stem, extension, suffix)
}

/// Provider of playable track URIs, read once when a session starts.
pub trait TrackSource {
    fn tracks(&self) -> Result<Vec<String>>;
}

/// In-memory track list.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticTrackSource {
    tracks: Vec<String>,
}

impl StaticTrackSource {
    pub fn new<I, S>(tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tracks: tracks.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a JSON array of URIs, e.g. `["/music/a.mp3", "/music/b.mp3"]`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PlaybackError::track_source(&e.to_string()))
    }
}

impl TrackSource for StaticTrackSource {
    fn tracks(&self) -> Result<Vec<String>> {
        Ok(self.tracks.clone())
    }
}

/// Picks one track uniformly at random.
pub fn pick_random(source: &dyn TrackSource) -> Result<String> {
    let tracks = source.tracks()?;
    tracks
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| PlaybackError::track_source("no track available"))
}
