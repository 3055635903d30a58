//! Tunedeck client: HTTP transport, query cache and resource accessors for
//! the music catalog admin console.

pub mod cache;
pub mod config;
pub mod console;
pub mod envelope;
pub mod error;
pub mod events;
pub mod notifications;
pub mod resources;
pub mod session;
pub mod telemetry;
pub mod transport;

pub use cache::{CacheRead, CacheStats, EntryStatus, MutationPolicy, QueryCache, QueryPolicy};
pub use config::{ConfigError, ConsoleConfig, LogFormat};
pub use console::Console;
pub use error::ConsoleError;
pub use events::ClientEvent;
pub use notifications::{ErrorHandler, Notification, NotificationAction, NotificationLevel};
pub use session::{Session, SessionError, TokenStore};
pub use transport::{RequestOptions, Transport, TransportOptions, UploadFile};
