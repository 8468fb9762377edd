//! Subscribe-for-changes hook over the query cache.
//!
//! A view keeps a `Subscription<T>` for every key it renders. Holding it keeps
//! the key observed, so invalidations refetch it eagerly, and lets the view
//! learn about transitions of that key.
//!
//! # Example
//!
//! ```ignore
//! let mut jobs = console.jobs.watch_list(ListScope::All);
//!
//! // In event loop tick
//! if jobs.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match jobs.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(listing) => render_table(listing),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::cache::{CacheEvent, EntityKey, EntryState, Observation, QueryCache};
use crate::error::ReadError;

/// The state of a watched key as a view renders it
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Nothing fetched yet
  Idle,
  /// First fetch in flight
  Loading,
  /// A value is available (possibly being refreshed in the background)
  Success(T),
  /// The last fetch failed
  Error(ReadError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ReadError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// Live view of one cache key.
pub struct Subscription<T> {
  observation: Observation,
  receiver: broadcast::Receiver<CacheEvent>,
  state: QueryState<T>,
  _value: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
  /// Observe `key`, fetching it with `fetcher` whenever the cache needs to.
  pub fn new<F, Fut>(cache: &QueryCache, key: EntityKey, freshness: Duration, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ReadError>> + Send + 'static,
  {
    // Subscribe before observing so the first fetch is not missed.
    let receiver = cache.subscribe();
    let observation = cache.observe(key, freshness, fetcher);
    let mut subscription = Self {
      observation,
      receiver,
      state: QueryState::Idle,
      _value: PhantomData,
    };
    subscription.sync();
    subscription
  }

  pub fn key(&self) -> &EntityKey {
    self.observation.key()
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&ReadError> {
    self.state.error()
  }

  /// Raw cache state of the key.
  pub fn entry_state(&self) -> EntryState {
    self.observation.cache().state(self.key())
  }

  /// Drain pending transitions without blocking.
  ///
  /// Returns `true` if the key changed. Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    loop {
      match self.receiver.try_recv() {
        Ok(event) => changed |= event.key == *self.key(),
        Err(TryRecvError::Lagged(_)) => changed = true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    if changed {
      self.sync();
    }
    changed
  }

  /// Wait for the next transition of the key. Returns `false` once the cache
  /// is gone.
  pub async fn changed(&mut self) -> bool {
    loop {
      match self.receiver.recv().await {
        Ok(event) if event.key == *self.key() => break,
        Ok(_) => continue,
        Err(RecvError::Lagged(_)) => break,
        Err(RecvError::Closed) => return false,
      }
    }
    self.sync();
    true
  }

  /// Manually re-trigger the fetch of this key.
  pub fn refetch(&self) -> bool {
    self.observation.cache().refetch(self.key())
  }

  fn sync(&mut self) {
    let peek = self.observation.cache().peek::<T>(self.key());
    self.state = match (peek.error, peek.value, peek.state) {
      (Some(error), _, EntryState::Error) => QueryState::Error(error),
      (_, Some(value), _) => QueryState::Success(value),
      (_, None, EntryState::Loading) => QueryState::Loading,
      _ => QueryState::Idle,
    };
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Subscription<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("key", self.observation.key())
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{EntityKind, KeyPattern};
  use crate::error::GatewayError;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  const FRESH: Duration = Duration::from_secs(60);

  #[tokio::test]
  async fn test_subscription_success() {
    let cache = QueryCache::new();
    let mut sub = Subscription::new(&cache, EntityKey::list(EntityKind::Job), FRESH, || async {
      Ok::<_, ReadError>(vec![1, 2, 3])
    });

    assert!(sub.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(sub.poll());
    assert!(sub.is_success());
    assert_eq!(sub.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_subscription_error() {
    let cache = QueryCache::new();
    let mut sub: Subscription<i32> =
      Subscription::new(&cache, EntityKey::list(EntityKind::Job), FRESH, || async {
        Err(ReadError::Gateway(GatewayError::new(Some(500), "Something went wrong")))
      });

    assert!(sub.changed().await);
    // Loading was already seen at construction; wait for the failure.
    while !sub.is_error() {
      assert!(sub.changed().await);
    }
    assert_eq!(
      sub.error().and_then(|e| e.gateway()).map(|e| e.message.as_str()),
      Some("Something went wrong")
    );
  }

  #[tokio::test]
  async fn test_subscription_sees_refetch_after_invalidation() {
    let cache = QueryCache::new();
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut sub = Subscription::new(
      &cache,
      EntityKey::item(EntityKind::Job, "5"),
      FRESH,
      move || {
        let counter = counter_clone.clone();
        async move { Ok::<_, ReadError>(counter.fetch_add(1, Ordering::SeqCst)) }
      },
    );

    tokio::time::sleep(Duration::from_millis(10)).await;
    sub.poll();
    assert_eq!(sub.data(), Some(&0));

    cache.invalidate(&KeyPattern::kind(EntityKind::Job));
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(sub.poll());
    assert_eq!(sub.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_poll_ignores_other_keys() {
    let cache = QueryCache::new();
    let mut sub = Subscription::new(&cache, EntityKey::list(EntityKind::Country), FRESH, || async {
      Ok::<_, ReadError>(1u8)
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    sub.poll();

    cache
      .read(EntityKey::list(EntityKind::State), FRESH, || async {
        Ok::<_, ReadError>(2u8)
      })
      .await
      .unwrap();
    assert!(!sub.poll());
  }

  #[tokio::test]
  async fn test_drop_releases_observer() {
    let cache = QueryCache::new();
    let key = EntityKey::list(EntityKind::Application);
    let sub = Subscription::new(&cache, key.clone(), FRESH, || async {
      Ok::<_, ReadError>(0u8)
    });
    assert_eq!(cache.observers(&key), 1);
    drop(sub);
    assert_eq!(cache.observers(&key), 0);
  }

  #[tokio::test]
  async fn test_fetch_outlives_dropped_subscription() {
    let cache = QueryCache::new();
    let key = EntityKey::item(EntityKind::Job, "5");
    let sub = Subscription::new(&cache, key.clone(), FRESH, || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok::<_, ReadError>(5u32)
    });
    drop(sub);
    assert_eq!(cache.observers(&key), 0);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let peek = cache.peek::<u32>(&key);
    assert_eq!(peek.value, Some(5));
    assert_eq!(peek.state, EntryState::Fresh);
  }

  #[tokio::test]
  async fn test_only_newest_fetch_lands_after_drop() {
    let cache = QueryCache::new();
    let key = EntityKey::item(EntityKind::Job, "6");
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let sub = Subscription::new(&cache, key.clone(), FRESH, move || {
      let calls = calls_clone.clone();
      async move {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = if n == 1 { 50 } else { 10 };
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok::<_, ReadError>(n)
      }
    });
    assert!(sub.refetch());
    drop(sub);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let peek = cache.peek::<u32>(&key);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(peek.value, Some(2));
    assert_eq!(peek.state, EntryState::Fresh);
  }
}

