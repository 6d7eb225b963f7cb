//! Core data model: the normalized channel record.
//!
//! A [`Channel`] is produced by exactly one of the builders in
//! [`builder`](crate::builder) and carries its own [`Diagnostics`]. Channel
//! ids and playlist ids share a suffix and only differ in their two-letter
//! prefix, so playlists are stored as presence flags and derived on demand.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::coerce::{is_missing, MISSING_VALUE};
use crate::diagnostics::{Diagnostic, Diagnostics};

pub const CHANNEL_PREFIX: &str = "UC";
pub const UPLOADS_PLAYLIST_PREFIX: &str = "UU";
pub const FAVOURITES_PLAYLIST_PREFIX: &str = "FL";
pub const LIKES_PLAYLIST_PREFIX: &str = "LL";

/// Thumbnail size names copied from sources; anything else is ignored.
pub const THUMBNAIL_SIZES: [&str; 3] = ["default", "high", "medium"];

/// Field order for string-list sources and key set for map sources.
///
/// Also the column order of the `youtube_channels` table.
pub const CHANNEL_FIELDS: [&str; 10] = [
    "id",
    "uploads_playlist",
    "favourites_playlist",
    "likes_playlist",
    "title",
    "description",
    "published_at",
    "thumbnail_default",
    "thumbnail_high",
    "thumbnail_medium",
];

/// Normalized channel record.
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    id: String,
    pub has_uploads_playlist: bool,
    pub has_favourites_playlist: bool,
    pub has_likes_playlist: bool,
    pub description: String,
    pub published_at: String,
    pub thumbnails: BTreeMap<String, String>,
    pub title: String,
    #[serde(flatten)]
    diagnostics: Diagnostics,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            id: MISSING_VALUE.to_string(),
            has_uploads_playlist: false,
            has_favourites_playlist: false,
            has_likes_playlist: false,
            description: MISSING_VALUE.to_string(),
            published_at: MISSING_VALUE.to_string(),
            thumbnails: BTreeMap::new(),
            title: MISSING_VALUE.to_string(),
            diagnostics: Diagnostics::new(),
        }
    }
}

impl Channel {
    /// An entity with every field at its sentinel default.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Assign the identifier. Returns `false` (and changes nothing) when a
    /// real id is already set or the new value is itself missing.
    pub fn set_id(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if !is_missing(&self.id) || is_missing(&id) {
            return false;
        }
        self.id = id;
        true
    }

    /// The id without its channel prefix, shared by all derived playlists.
    fn id_suffix(&self) -> Option<&str> {
        if is_missing(&self.id) {
            return None;
        }
        Some(self.id.strip_prefix(CHANNEL_PREFIX).unwrap_or(&self.id))
    }

    fn derived_playlist(&self, present: bool, prefix: &str) -> Option<String> {
        if !present {
            return None;
        }
        self.id_suffix().map(|s| format!("{}{}", prefix, s))
    }

    pub fn uploads_playlist(&self) -> Option<String> {
        self.derived_playlist(self.has_uploads_playlist, UPLOADS_PLAYLIST_PREFIX)
    }

    pub fn favourites_playlist(&self) -> Option<String> {
        self.derived_playlist(self.has_favourites_playlist, FAVOURITES_PLAYLIST_PREFIX)
    }

    pub fn likes_playlist(&self) -> Option<String> {
        self.derived_playlist(self.has_likes_playlist, LIKES_PLAYLIST_PREFIX)
    }

    pub fn thumbnail(&self, size: &str) -> Option<&str> {
        self.thumbnails.get(size).map(String::as_str)
    }

    /// Parsed `published_at`, if present and valid RFC 3339.
    pub fn published_at_datetime(&self) -> Option<DateTime<Utc>> {
        if is_missing(&self.published_at) {
            return None;
        }
        DateTime::parse_from_rfc3339(&self.published_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn errors(&self) -> &[Diagnostic] {
        self.diagnostics.errors()
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        self.diagnostics.warnings()
    }

    pub fn was_aborted(&self) -> bool {
        self.diagnostics.was_aborted()
    }

    pub fn clear_errors(&mut self) {
        self.diagnostics.clear_errors();
    }

    pub fn clear_warnings(&mut self) {
        self.diagnostics.clear_warnings();
    }

    pub fn clear_errors_and_warnings(&mut self) {
        self.diagnostics.clear();
    }

    /// Column values in [`CHANNEL_FIELDS`] order; `None` maps to SQL NULL.
    pub fn row_values(&self) -> [Option<String>; 10] {
        let text = |s: &str| (!is_missing(s)).then(|| s.to_string());
        [
            Some(self.id.clone()),
            self.uploads_playlist(),
            self.favourites_playlist(),
            self.likes_playlist(),
            text(&self.title),
            Some(self.description.clone()),
            text(&self.published_at),
            self.thumbnail("default").map(str::to_string),
            self.thumbnail("high").map(str::to_string),
            self.thumbnail("medium").map(str::to_string),
        ]
    }
}
