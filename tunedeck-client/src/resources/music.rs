//! Nested catalog collections, playlist membership and search.

use serde::de::IgnoredAny;
use serde_json::json;
use tunedeck_core::{
    keys, Album, ApiResult, Artist, Playlist, SearchResults, SearchType, Track,
};

use super::{Context, Record, Resource};

impl Resource<Artist> {
    /// Albums by one artist; disabled for an empty id.
    pub async fn albums(&self, artist_id: &str) -> ApiResult<Option<Vec<Album>>> {
        if artist_id.is_empty() {
            return Ok(None);
        }
        let path = format!("{}/{}/albums", Artist::PATH, artist_id);
        self.context()
            .cached_get(keys::artist_albums(artist_id), path, None::<()>)
            .await
            .map(Some)
    }
}

impl Resource<Album> {
    pub async fn tracks(&self, album_id: &str) -> ApiResult<Option<Vec<Track>>> {
        if album_id.is_empty() {
            return Ok(None);
        }
        let path = format!("{}/{}/tracks", Album::PATH, album_id);
        self.context()
            .cached_get(keys::album_tracks(album_id), path, None::<()>)
            .await
            .map(Some)
    }
}

impl Resource<Playlist> {
    pub async fn tracks(&self, playlist_id: &str) -> ApiResult<Option<Vec<Track>>> {
        if playlist_id.is_empty() {
            return Ok(None);
        }
        let path = format!("{}/{}/tracks", Playlist::PATH, playlist_id);
        self.context()
            .cached_get(keys::playlist_tracks(playlist_id), path, None::<()>)
            .await
            .map(Some)
    }

    pub async fn add_track(&self, playlist_id: &str, track_id: &str) -> ApiResult<()> {
        let ctx = self.context();
        let transport = &ctx.transport;
        let path = format!("{}/{}/tracks", Playlist::PATH, playlist_id);
        let path = path.as_str();
        let body = json!({ "trackId": track_id });
        let body = &body;
        ctx.writes
            .run(move || transport.post::<IgnoredAny, _>(path, Some(body)))
            .await?;
        self.invalidate_membership(playlist_id);
        Ok(())
    }

    pub async fn remove_track(&self, playlist_id: &str, track_id: &str) -> ApiResult<()> {
        let ctx = self.context();
        let transport = &ctx.transport;
        let path = format!("{}/{}/tracks/{}", Playlist::PATH, playlist_id, track_id);
        let path = path.as_str();
        ctx.writes
            .run(move || transport.delete::<IgnoredAny>(path))
            .await?;
        self.invalidate_membership(playlist_id);
        Ok(())
    }

    // The detail key prefixes the nested tracks key.
    fn invalidate_membership(&self, playlist_id: &str) {
        let ctx = self.context();
        ctx.invalidate(&keys::detail(Playlist::DOMAIN, playlist_id));
        ctx.invalidate(&keys::lists(Playlist::DOMAIN));
    }
}

/// Catalog search across artists, albums and tracks.
#[derive(Debug, Clone)]
pub struct SearchApi {
    ctx: Context,
}

impl SearchApi {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Search the catalog. An empty query disables the read and yields `None`.
    pub async fn search(
        &self,
        query: &str,
        search_type: Option<SearchType>,
    ) -> ApiResult<Option<SearchResults>> {
        if query.is_empty() {
            return Ok(None);
        }
        let type_name = search_type.map(|t| t.as_str());
        let params = json!({ "query": query, "type": type_name });
        self.ctx
            .cached_get(
                keys::search(query, type_name),
                "/search".to_string(),
                Some(params),
            )
            .await
            .map(Some)
    }
}
