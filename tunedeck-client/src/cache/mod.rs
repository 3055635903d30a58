//! Query cache for resource reads.
//!
//! - `policy` - freshness windows and retry backoff
//! - `read` - the [`CacheRead`] wrapper returned by every read
//! - `store` - the keyed [`QueryCache`] itself

mod policy;
mod read;
mod store;

pub use policy::{Backoff, MutationPolicy, QueryPolicy};
pub use read::CacheRead;
pub use store::{CacheStats, EntryStatus, QueryCache};
