//! In-memory query cache for server-owned entities.
//!
//! This module provides an entity-agnostic caching mechanism that:
//! - Keys results by structural tuples (`EntityKey`)
//! - Tracks freshness per entry and serves stale values while revalidating
//! - Shares one in-flight fetch between concurrent readers of a key
//! - Invalidates by key prefix (`KeyPattern`) and refetches observed keys
//! - Keeps only the result of the most recently issued fetch per key

mod entry;
mod key;
mod layer;

pub use entry::{CacheEvent, EntryState, Peek};
pub use key::{EntityKey, EntityKind, KeyPattern, Qualifier};
pub use layer::{Observation, QueryCache};
