//! Structural identifiers for cached queries.
//!
//! A [`QueryKey`] is an ordered tuple of JSON segments, typically
//! `(resource, kind, params)`. Keys compare structurally, and one key is a
//! prefix of another when its segments match the other's leading segments.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

pub const LIST: &str = "list";
pub const DETAIL: &str = "detail";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryKey {
    segments: Vec<Value>,
}

impl QueryKey {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(domain: &str) -> Self {
        Self::new().push(domain)
    }

    /// Append a segment. Values that fail to serialize become `null`.
    pub fn push(mut self, segment: impl Serialize) -> Self {
        let value = serde_json::to_value(segment).unwrap_or(Value::Null);
        self.segments.push(value);
        self
    }

    pub fn segments(&self) -> &[Value] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix`'s segments equal this key's leading segments.
    ///
    /// Every key starts with itself and with the empty key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self
                .segments
                .iter()
                .zip(prefix.segments.iter())
                .all(|(a, b)| a == b)
    }

    /// Canonical string encoding used to index cache entries.
    ///
    /// Object members serialize in sorted order, so structurally equal keys
    /// always normalize to the same string.
    pub fn normalized(&self) -> String {
        Value::Array(self.segments.clone()).to_string()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

/// Key factory shared by every accessor.
pub mod keys {
    use super::{QueryKey, DETAIL, LIST};
    use serde::Serialize;

    pub const AUTH: &str = "auth";
    pub const ARTISTS: &str = "artists";
    pub const ALBUMS: &str = "albums";
    pub const TRACKS: &str = "tracks";
    pub const PLAYLISTS: &str = "playlists";
    pub const EVENTS: &str = "events";
    pub const SEARCH: &str = "search";

    pub fn auth_me() -> QueryKey {
        QueryKey::root(AUTH).push("me")
    }

    pub fn all(domain: &str) -> QueryKey {
        QueryKey::root(domain)
    }

    pub fn lists(domain: &str) -> QueryKey {
        all(domain).push(LIST)
    }

    pub fn list<P: Serialize>(domain: &str, params: Option<&P>) -> QueryKey {
        lists(domain).push(params)
    }

    pub fn details(domain: &str) -> QueryKey {
        all(domain).push(DETAIL)
    }

    pub fn detail(domain: &str, id: &str) -> QueryKey {
        details(domain).push(id)
    }

    pub fn artist_albums(artist_id: &str) -> QueryKey {
        detail(ARTISTS, artist_id).push("albums")
    }

    pub fn album_tracks(album_id: &str) -> QueryKey {
        detail(ALBUMS, album_id).push(TRACKS)
    }

    pub fn playlist_tracks(playlist_id: &str) -> QueryKey {
        detail(PLAYLISTS, playlist_id).push(TRACKS)
    }

    pub fn search(query: &str, search_type: Option<&str>) -> QueryKey {
        QueryKey::root(SEARCH).push(query).push(search_type)
    }
}
