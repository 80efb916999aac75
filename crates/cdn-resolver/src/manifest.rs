//! Play info decoding.
//!
//! The player receives DASH play info either inline on the page or from the
//! playurl API. Two layouts are known; they only differ in where the `dash`
//! object lives. Everything else in the payload is ignored.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::ManifestError;

/// Where the `dash` object was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `data.dash`, used by the regular video page and the playurl API.
    Video,
    /// `result.video_info.dash`, used by the bangumi page.
    Bangumi,
}

impl Layout {
    const ALL: [Layout; 2] = [Layout::Video, Layout::Bangumi];

    fn dash_pointer(self) -> &'static str {
        match self {
            Layout::Video => "/data/dash",
            Layout::Bangumi => "/result/video_info/dash",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Video => write!(f, "video"),
            Layout::Bangumi => write!(f, "bangumi"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    fn key(self) -> &'static str {
        match self {
            TrackKind::Video => "video",
            TrackKind::Audio => "audio",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Deduplicated group of interchangeable URLs declared for one track entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    urls: Vec<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `url` unless already present. Returns whether it was added.
    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.urls.contains(&url) {
            return false;
        }
        self.urls.push(url);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|u| u == url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for url in iter {
            set.insert(url);
        }
        set
    }
}

/// One quality rung of a video or audio track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    pub track: TrackKind,
    /// Position of the entry inside its track array.
    pub index: usize,
    pub candidates: CandidateSet,
}

impl MediaEntry {
    /// Collects every declared URL of a track entry. Returns `None` for
    /// entries that are not objects.
    fn from_value(track: TrackKind, index: usize, value: &Value) -> Option<Self> {
        let entry = value.as_object()?;
        let mut candidates = CandidateSet::new();

        for key in ["baseUrl", "base_url"] {
            if let Some(url) = entry.get(key).and_then(Value::as_str) {
                candidates.insert(url);
            }
        }
        for key in ["backupUrl", "backup_url"] {
            if let Some(urls) = entry.get(key).and_then(Value::as_array) {
                urls.iter()
                    .filter_map(Value::as_str)
                    .for_each(|url| {
                        candidates.insert(url);
                    });
            }
        }

        Some(Self {
            track,
            index,
            candidates,
        })
    }
}

/// Decoded play info: the layout it matched and its track entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayInfo {
    pub layout: Layout,
    pub entries: Vec<MediaEntry>,
}

impl PlayInfo {
    /// Tries the video layout first, then the bangumi layout.
    pub fn from_value(value: &Value) -> Result<Self, ManifestError> {
        let (layout, dash) = Layout::ALL
            .into_iter()
            .find_map(|layout| {
                value
                    .pointer(layout.dash_pointer())
                    .and_then(Value::as_object)
                    .map(|dash| (layout, dash))
            })
            .ok_or(ManifestError::UnrecognizedLayout)?;

        let mut entries = Vec::new();
        for track in [TrackKind::Video, TrackKind::Audio] {
            entries.extend(Self::track_entries(dash, track));
        }

        Ok(Self { layout, entries })
    }

    pub fn from_json_str(body: &str) -> Result<Self, ManifestError> {
        let value: Value = serde_json::from_str(body)?;
        Self::from_value(&value)
    }

    fn track_entries(
        dash: &Map<String, Value>,
        track: TrackKind,
    ) -> impl Iterator<Item = MediaEntry> + '_ {
        dash.get(track.key())
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
            .filter_map(move |(index, value)| MediaEntry::from_value(track, index, value))
    }

    pub fn candidate_count(&self) -> usize {
        self.entries.iter().map(|e| e.candidates.len()).sum()
    }
}
