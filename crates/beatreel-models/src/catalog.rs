//! Artist catalog records.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One track in an artist's catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub title: String,
    /// Downloadable audio asset, when one exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Display duration, `m:ss` or `h:mm:ss`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

impl Track {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: None,
            duration_label: None,
            year: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_duration_label(mut self, label: impl Into<String>) -> Self {
        self.duration_label = Some(label.into());
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_label.as_deref().and_then(parse_duration_label)
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Artist {
    pub name: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Artist {
    pub fn new(name: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            genre: genre.into(),
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Tracks that can be downloaded.
    pub fn remote_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.source_url.is_some())
    }
}

/// Parse `m:ss` or `h:mm:ss` into seconds.
///
/// Seconds and minutes after the leading field must be below 60.
pub fn parse_duration_label(label: &str) -> Option<f64> {
    let parts: Vec<&str> = label.trim().split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return None;
    }

    let mut fields = Vec::with_capacity(parts.len());
    for part in &parts {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        fields.push(part.parse::<u64>().ok()?);
    }

    let (h, m, s) = match fields.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => {
            if *m >= 60 {
                return None;
            }
            (*h, *m, *s)
        }
        _ => return None,
    };
    if s >= 60 {
        return None;
    }

    Some((h * 3600 + m * 60 + s) as f64)
}
