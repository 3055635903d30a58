//! The console facade: one session, transport and cache shared by every accessor.

use tokio::sync::broadcast;
use tunedeck_core::ApiResult;

use crate::cache::{MutationPolicy, QueryCache, QueryPolicy};
use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::events::ClientEvent;
use crate::notifications::ErrorHandler;
use crate::resources::{
    AlbumApi, ArtistApi, AuthApi, Context, EventApi, PlaylistApi, Resource, SearchApi, TrackApi,
};
use crate::session::{Session, TokenStore};
use crate::transport::{Transport, TransportOptions};

#[derive(Debug, Clone)]
pub struct Console {
    ctx: Context,
    errors: ErrorHandler,
    locale: String,
}

impl Console {
    /// Build a console from configuration, restoring any persisted token.
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        let session = Session::with_store(TokenStore::new(&config.token_path))?;
        let console = Self::new(
            TransportOptions::from_config(config),
            session,
            config.query_policy(),
            config.mutation_policy(),
        )?
        .with_locale(config.locale.clone());
        Ok(console)
    }

    pub fn new(
        options: TransportOptions,
        session: Session,
        reads: QueryPolicy,
        writes: MutationPolicy,
    ) -> Result<Self, ConsoleError> {
        let errors = ErrorHandler::new(session.event_sender());
        let transport = Transport::new(options, session)?;
        let cache = QueryCache::with_defaults(reads);
        let ctx = Context::new(transport, cache).with_policies(reads, writes);
        Ok(Self {
            ctx,
            errors,
            locale: "en".to_string(),
        })
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn session(&self) -> &Session {
        self.ctx.transport.session()
    }

    pub fn transport(&self) -> &Transport {
        &self.ctx.transport
    }

    pub fn cache(&self) -> &QueryCache {
        &self.ctx.cache
    }

    pub fn errors(&self) -> &ErrorHandler {
        &self.errors
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.session().subscribe()
    }

    pub fn artists(&self) -> ArtistApi {
        Resource::new(self.ctx.clone())
    }

    pub fn albums(&self) -> AlbumApi {
        Resource::new(self.ctx.clone())
    }

    pub fn tracks(&self) -> TrackApi {
        Resource::new(self.ctx.clone())
    }

    pub fn playlists(&self) -> PlaylistApi {
        Resource::new(self.ctx.clone())
    }

    pub fn events(&self) -> EventApi {
        Resource::new(self.ctx.clone())
    }

    pub fn search(&self) -> SearchApi {
        SearchApi::new(self.ctx.clone())
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.ctx.clone())
    }

    /// Sign out: token first, then the whole cache.
    pub async fn logout(&self) -> ApiResult<()> {
        self.auth().logout().await
    }
}
