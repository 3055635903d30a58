//! Resource accessors: cached reads and invalidating writes per domain.
//!
//! Every catalog resource shares the same shape (`list`, `detail`, `create`,
//! `update`, `delete`), so one generic [`Resource`] serves them all. Extra
//! per-resource operations live in `music`, `events` and `auth`.

mod auth;
mod events;
mod music;

pub use auth::{AuthApi, PasswordChange, PasswordReset};
pub use music::SearchApi;

use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::marker::PhantomData;
use tunedeck_core::{
    keys, Album, ApiError, ApiResult, Artist, Event, PaginatedData, PaginationParams, Playlist, QueryKey,
    Track,
};

use crate::cache::{CacheRead, MutationPolicy, QueryCache, QueryPolicy};
use crate::envelope::decode;
use crate::transport::{RequestOptions, Transport};

/// Transport, cache and policies shared by every accessor.
#[derive(Debug, Clone)]
pub struct Context {
    pub transport: Transport,
    pub cache: QueryCache,
    pub reads: QueryPolicy,
    pub writes: MutationPolicy,
}

impl Context {
    pub fn new(transport: Transport, cache: QueryCache) -> Self {
        Self {
            transport,
            cache,
            reads: QueryPolicy::default(),
            writes: MutationPolicy::default(),
        }
    }

    pub fn with_policies(mut self, reads: QueryPolicy, writes: MutationPolicy) -> Self {
        self.reads = reads;
        self.writes = writes;
        self
    }

    /// `GET path` through the cache under `key`.
    pub(crate) async fn cached_get<T, P>(
        &self,
        key: QueryKey,
        path: String,
        params: Option<P>,
    ) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        P: Serialize + Clone + Send + Sync + 'static,
    {
        let mut options = RequestOptions::new();
        if let Some(params) = &params {
            let params = serde_json::to_value(params).map_err(|err| {
                ApiError::network(format!("unserializable request: {}", err))
            })?;
            options = options.with_params(params);
        }
        let transport = self.transport.clone();
        // Only the request is retried; a body that does not decode fails once.
        let read = self
            .cache
            .read_value(&key, &self.reads, move || {
                let transport = transport.clone();
                let path = path.clone();
                let options = options.clone();
                async move { transport.request_value(Method::GET, &path, options).await }
            })
            .await?;
        read.try_map(decode).map(CacheRead::into_value)
    }

    pub(crate) fn invalidate(&self, prefix: &QueryKey) {
        self.cache.invalidate(prefix);
    }
}

/// A catalog record type served under one REST collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// First segment of every query key for this record.
    const DOMAIN: &'static str;
    /// Collection path, e.g. `/artists`.
    const PATH: &'static str;
    /// Payload returned by the collection's list endpoint.
    type Listing: Serialize + DeserializeOwned + Send + 'static;
}

impl Record for Artist {
    const DOMAIN: &'static str = keys::ARTISTS;
    const PATH: &'static str = "/artists";
    type Listing = PaginatedData<Artist>;
}

impl Record for Album {
    const DOMAIN: &'static str = keys::ALBUMS;
    const PATH: &'static str = "/albums";
    type Listing = PaginatedData<Album>;
}

impl Record for Track {
    const DOMAIN: &'static str = keys::TRACKS;
    const PATH: &'static str = "/tracks";
    type Listing = PaginatedData<Track>;
}

impl Record for Playlist {
    const DOMAIN: &'static str = keys::PLAYLISTS;
    const PATH: &'static str = "/playlists";
    type Listing = PaginatedData<Playlist>;
}

impl Record for Event {
    const DOMAIN: &'static str = keys::EVENTS;
    const PATH: &'static str = "/v1/events";
    type Listing = Vec<Event>;
}

/// Accessor for one record type.
pub struct Resource<R: Record> {
    ctx: Context,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Resource<R> {
    fn clone(&self) -> Self {
        Self::new(self.ctx.clone())
    }
}

impl<R: Record> std::fmt::Debug for Resource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("domain", &R::DOMAIN)
            .field("path", &R::PATH)
            .finish()
    }
}

impl<R: Record> Resource<R> {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            _record: PhantomData,
        }
    }

    pub(crate) fn context(&self) -> &Context {
        &self.ctx
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", R::PATH, id)
    }

    pub async fn list(&self, params: Option<&PaginationParams>) -> ApiResult<R::Listing> {
        self.ctx
            .cached_get(keys::list(R::DOMAIN, params), R::PATH.to_string(), params.cloned())
            .await
    }

    /// Fetch one record. An empty `id` disables the read and yields `None`.
    pub async fn detail(&self, id: &str) -> ApiResult<Option<R>> {
        if id.is_empty() {
            return Ok(None);
        }
        self.ctx
            .cached_get(keys::detail(R::DOMAIN, id), Self::item_path(id), None::<()>)
            .await
            .map(Some)
    }

    pub async fn create<B>(&self, body: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
    {
        let transport = &self.ctx.transport;
        let created = self
            .ctx
            .writes
            .run(move || transport.post::<R, B>(R::PATH, Some(body)))
            .await?;
        self.ctx.invalidate(&keys::lists(R::DOMAIN));
        Ok(created)
    }

    pub async fn update<B>(&self, id: &str, patch: &B) -> ApiResult<R>
    where
        B: Serialize + ?Sized,
    {
        let transport = &self.ctx.transport;
        let path = Self::item_path(id);
        let path = path.as_str();
        let updated = self
            .ctx
            .writes
            .run(move || transport.put::<R, B>(path, Some(patch)))
            .await?;
        self.invalidate_record(id);
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let transport = &self.ctx.transport;
        let path = Self::item_path(id);
        let path = path.as_str();
        self.ctx
            .writes
            .run(move || transport.delete::<IgnoredAny>(path))
            .await?;
        self.invalidate_record(id);
        Ok(())
    }

    fn invalidate_record(&self, id: &str) {
        self.ctx.invalidate(&keys::detail(R::DOMAIN, id));
        self.ctx.invalidate(&keys::lists(R::DOMAIN));
    }
}

pub type ArtistApi = Resource<Artist>;
pub type AlbumApi = Resource<Album>;
pub type TrackApi = Resource<Track>;
pub type PlaylistApi = Resource<Playlist>;
pub type EventApi = Resource<Event>;
