//! Per-key cache entry and the transitions it reports.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use super::key::EntityKey;
use crate::error::ReadError;

/// Type-erased cached value. Every key holds exactly one concrete type.
pub(crate) type CachedValue = Arc<dyn Any + Send + Sync>;

pub(crate) type FetchFuture = BoxFuture<'static, Result<CachedValue, ReadError>>;

/// Factory producing a new fetch for a key; kept so the entry can refetch itself.
pub(crate) type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// A fetch shared by every reader that attached to it.
pub(crate) type SharedFetch = Shared<FetchFuture>;

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
  /// Never fetched
  Empty,
  /// A fetch is in flight
  Loading,
  /// Value present and inside its freshness window
  Fresh,
  /// Value present but past its window or explicitly invalidated
  Stale,
  /// The last fetch failed
  Error,
}

/// Broadcast on every state transition of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
  pub key: EntityKey,
  pub state: EntryState,
}

/// Snapshot of an entry taken without fetching.
#[derive(Debug, Clone)]
pub struct Peek<T> {
  pub value: Option<T>,
  pub state: EntryState,
  pub fetched_at: Option<Instant>,
  pub error: Option<ReadError>,
}

pub(crate) struct InFlight {
  pub generation: u64,
  pub future: SharedFetch,
}

pub(crate) struct Slot {
  pub value: Option<CachedValue>,
  pub fetched_at: Option<Instant>,
  pub freshness: Duration,
  /// Set by invalidation, cleared by the next applied fetch
  pub invalidated: bool,
  pub error: Option<ReadError>,
  /// Id of the most recently issued fetch; only its result is applied
  pub generation: u64,
  pub in_flight: Option<InFlight>,
  pub fetcher: Option<Fetcher>,
  pub observers: usize,
}

impl Slot {
  pub fn new(freshness: Duration) -> Self {
    Self {
      value: None,
      fetched_at: None,
      freshness,
      invalidated: false,
      error: None,
      generation: 0,
      in_flight: None,
      fetcher: None,
      observers: 0,
    }
  }

  pub fn state(&self, now: Instant) -> EntryState {
    if self.in_flight.is_some() {
      EntryState::Loading
    } else if self.error.is_some() {
      EntryState::Error
    } else if self.value.is_none() {
      EntryState::Empty
    } else if self.is_stale(now) {
      EntryState::Stale
    } else {
      EntryState::Fresh
    }
  }

  pub fn is_stale(&self, now: Instant) -> bool {
    if self.invalidated {
      return true;
    }
    match self.fetched_at {
      Some(at) => now.duration_since(at) > self.freshness,
      None => true,
    }
  }

  /// Value a read may return without waiting. Invalidated or failed entries
  /// are never served.
  pub fn servable(&self) -> Option<&CachedValue> {
    if self.invalidated || self.error.is_some() {
      return None;
    }
    self.value.as_ref()
  }
}
