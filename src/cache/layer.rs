//! Query cache: keyed store of fetched values with freshness windows,
//! shared in-flight fetches and prefix invalidation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::entry::{
  CacheEvent, CachedValue, EntryState, Fetcher, InFlight, Peek, SharedFetch, Slot,
};
use super::key::{EntityKey, KeyPattern};
use crate::error::ReadError;

const EVENT_CAPACITY: usize = 256;

struct Inner {
  entries: Mutex<HashMap<EntityKey, Slot>>,
  events: broadcast::Sender<CacheEvent>,
}

/// Process-wide store of server-owned entities.
///
/// Constructed explicitly and handed to whoever needs it; clones share the
/// same entries. Locks are only held between suspension points, never across
/// a fetch.
pub struct QueryCache {
  shared: Arc<Inner>,
}

impl QueryCache {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      shared: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        events,
      }),
    }
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<EntityKey, Slot>> {
    // A panic inside the lock never leaves a slot half-updated.
    self
      .shared
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Read a key, fetching it when needed.
  ///
  /// - Fresh: returned immediately
  /// - Stale by age: returned immediately, a background refresh is issued
  /// - Empty, failed or invalidated: waits for a fetch
  ///
  /// A read that finds a fetch already in flight attaches to it instead of
  /// issuing another one.
  pub async fn read<T, F, Fut>(
    &self,
    key: EntityKey,
    freshness: Duration,
    fetcher: F,
  ) -> Result<T, ReadError>
  where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ReadError>> + Send + 'static,
  {
    let pending = {
      let mut entries = self.entries();
      let slot = entries
        .entry(key.clone())
        .or_insert_with(|| Slot::new(freshness));
      let fetcher = erase(fetcher);
      slot.freshness = freshness;
      slot.fetcher = Some(Arc::clone(&fetcher));

      if let Some(value) = slot.servable().cloned() {
        if slot.is_stale(Instant::now()) && slot.in_flight.is_none() {
          debug!(%key, "serving stale entry while revalidating");
          self.spawn_fetch(&key, slot, fetcher);
        } else {
          debug!(%key, "cache hit");
        }
        return downcast(&key, &value);
      }

      let in_flight = match slot.in_flight.take() {
        Some(in_flight) => {
          debug!(%key, generation = in_flight.generation, "attaching to in-flight fetch");
          in_flight
        }
        None => self.issue_fetch(&key, slot, fetcher),
      };
      let future = in_flight.future.clone();
      slot.in_flight = Some(in_flight);
      future
    };

    let value = pending.await?;
    downcast(&key, &value)
  }

  /// Mark every entry matching `pattern` stale.
  ///
  /// Fetches in flight for those entries are superseded, so their results are
  /// discarded. Observed entries are refetched right away. Returns the number
  /// of entries matched.
  pub fn invalidate(&self, pattern: &KeyPattern) -> usize {
    let mut entries = self.entries();
    let now = Instant::now();
    let mut matched = 0;

    for (key, slot) in entries.iter_mut().filter(|(key, _)| pattern.matches(key)) {
      matched += 1;
      slot.invalidated = true;
      slot.in_flight = None;
      slot.generation += 1;
      self.emit(key, slot.state(now));

      if slot.observers > 0 {
        if let Some(fetcher) = slot.fetcher.clone() {
          self.spawn_fetch(key, slot, fetcher);
        }
      }
    }

    info!(%pattern, matched, "invalidated cache entries");
    matched
  }

  /// Manually re-trigger a key with its last known fetcher, superseding any
  /// fetch already in flight. Returns false when the key was never read.
  pub fn refetch(&self, key: &EntityKey) -> bool {
    let mut entries = self.entries();
    let Some(slot) = entries.get_mut(key) else {
      return false;
    };
    match slot.fetcher.clone() {
      Some(fetcher) => {
        debug!(%key, "manual refetch");
        self.spawn_fetch(key, slot, fetcher);
        true
      }
      None => false,
    }
  }

  /// Current state of a key, `Empty` when it has never been read.
  pub fn state(&self, key: &EntityKey) -> EntryState {
    self
      .entries()
      .get(key)
      .map(|slot| slot.state(Instant::now()))
      .unwrap_or(EntryState::Empty)
  }

  /// Look at an entry without fetching. The value is `None` when nothing is
  /// cached or the cached value is not a `T`.
  pub fn peek<T: Clone + 'static>(&self, key: &EntityKey) -> Peek<T> {
    let entries = self.entries();
    match entries.get(key) {
      Some(slot) => Peek {
        value: slot
          .value
          .as_ref()
          .and_then(|v| v.downcast_ref::<T>())
          .cloned(),
        state: slot.state(Instant::now()),
        fetched_at: slot.fetched_at,
        error: slot.error.clone(),
      },
      None => Peek {
        value: None,
        state: EntryState::Empty,
        fetched_at: None,
        error: None,
      },
    }
  }

  /// Receive every entry transition.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.shared.events.subscribe()
  }

  /// Register an observer for a key and make sure it has, or is getting, a
  /// value. The key is unobserved when the returned guard drops.
  pub fn observe<T, F, Fut>(&self, key: EntityKey, freshness: Duration, fetcher: F) -> Observation
  where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ReadError>> + Send + 'static,
  {
    let mut entries = self.entries();
    let slot = entries
      .entry(key.clone())
      .or_insert_with(|| Slot::new(freshness));
    let fetcher = erase(fetcher);
    slot.freshness = freshness;
    slot.fetcher = Some(Arc::clone(&fetcher));
    slot.observers += 1;

    let needs_fetch = slot.in_flight.is_none()
      && (slot.servable().is_none() || slot.is_stale(Instant::now()));
    if needs_fetch {
      self.spawn_fetch(&key, slot, fetcher);
    }

    debug!(%key, observers = slot.observers, "observing key");
    Observation {
      cache: self.clone(),
      key,
    }
  }

  /// Number of live observers of a key.
  pub fn observers(&self, key: &EntityKey) -> usize {
    self.entries().get(key).map(|s| s.observers).unwrap_or(0)
  }

  fn release(&self, key: &EntityKey) {
    if let Some(slot) = self.entries().get_mut(key) {
      slot.observers = slot.observers.saturating_sub(1);
    }
  }

  /// Issue a new fetch for `slot`, superseding whatever was in flight.
  fn spawn_fetch(&self, key: &EntityKey, slot: &mut Slot, fetcher: Fetcher) {
    let in_flight = self.issue_fetch(key, slot, fetcher);
    slot.in_flight = Some(in_flight);
  }

  /// Start a fetch under the next generation of `slot`; the caller records it
  /// as the slot's in-flight fetch.
  ///
  /// The fetch applies its own result when it resolves, before any attached
  /// reader sees it. It is spawned so that it completes even with nobody
  /// awaiting it.
  fn issue_fetch(&self, key: &EntityKey, slot: &mut Slot, fetcher: Fetcher) -> InFlight {
    slot.generation += 1;
    let generation = slot.generation;

    let cache: Weak<Inner> = Arc::downgrade(&self.shared);
    let owned_key = key.clone();
    let fetch = fetcher();
    let future: SharedFetch = async move {
      let result = fetch.await;
      if let Some(shared) = cache.upgrade() {
        QueryCache { shared }.complete(&owned_key, generation, &result);
      }
      result
    }
    .boxed()
    .shared();

    debug!(%key, generation, "issued fetch");
    self.emit(key, EntryState::Loading);

    match Handle::try_current() {
      Ok(handle) => {
        handle.spawn(future.clone().map(|_| ()));
      }
      Err(_) => warn!(%key, "no async runtime, fetch runs only when awaited"),
    }

    InFlight { generation, future }
  }

  fn complete(&self, key: &EntityKey, generation: u64, result: &Result<CachedValue, ReadError>) {
    let mut entries = self.entries();
    let Some(slot) = entries.get_mut(key) else {
      return;
    };

    if slot.generation != generation {
      debug!(
        %key,
        generation,
        latest = slot.generation,
        "discarding superseded fetch result"
      );
      return;
    }

    slot.in_flight = None;
    match result {
      Ok(value) => {
        slot.value = Some(Arc::clone(value));
        slot.fetched_at = Some(Instant::now());
        slot.invalidated = false;
        slot.error = None;
      }
      Err(e) => {
        warn!(%key, error = %e, "fetch failed");
        slot.error = Some(e.clone());
      }
    }
    self.emit(key, slot.state(Instant::now()));
  }

  fn emit(&self, key: &EntityKey, state: EntryState) {
    // No subscribers is fine.
    let _ = self.shared.events.send(CacheEvent {
      key: key.clone(),
      state,
    });
  }
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for QueryCache {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

/// Guard keeping a key observed. Dropping it unregisters the observer; a fetch
/// already in flight still completes and is applied unless superseded.
pub struct Observation {
  cache: QueryCache,
  key: EntityKey,
}

impl Observation {
  pub fn key(&self) -> &EntityKey {
    &self.key
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }
}

impl Drop for Observation {
  fn drop(&mut self) {
    self.cache.release(&self.key);
    debug!(key = %self.key, "stopped observing key");
  }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
  T: Clone + Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ReadError>> + Send + 'static,
{
  Arc::new(move || {
    let fetch = fetcher();
    async move { fetch.await.map(|v| Arc::new(v) as CachedValue) }.boxed()
  })
}

fn downcast<T: Clone + 'static>(key: &EntityKey, value: &CachedValue) -> Result<T, ReadError> {
  value
    .downcast_ref::<T>()
    .cloned()
    .ok_or_else(|| ReadError::TypeMismatch { key: key.clone() })
}
