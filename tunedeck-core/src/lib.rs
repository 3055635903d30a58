//! Tunedeck core: catalog records, query keys, the error model and the event
//! views rendered by the admin console.
//!
//! Nothing in this crate performs I/O; the HTTP transport and query cache
//! live in `tunedeck-client`.

pub mod error;
pub mod models;
pub mod query_key;
pub mod timeline;

pub use error::{flatten_validation_errors, ApiError, ApiResult, ErrorKind};
pub use models::{
    Album, Artist, AuthResponse, Event, EventTranslations, Genre, LoginRequest, PaginatedData,
    PaginationParams, Playlist, RegisterRequest, SearchResults, SearchType, SortOrder, Track,
    TranslatedName, User, UserRole,
};
pub use query_key::{keys, QueryKey};
pub use timeline::{
    format_date_range, group_by_type, group_by_year, parse_event_date, DateStyle, TypeGroup,
    YearBucket, YearGroup,
};
