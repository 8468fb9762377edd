//! Typed snapshots of the entities the console manages.
//!
//! Snapshots are immutable: a refetch replaces the cached value as a whole.

mod application;
mod geo;
mod job;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use crate::cache::{EntityKey, EntityKind, KeyPattern};
use crate::mutation::Operation;
use crate::normalize::Envelope;

pub use application::{Application, ApplicationStatus, ApplicationUpdate, NewApplication};
pub use geo::{City, Country, CountryUpdate, Location, NewCountry, NewState, State, StateUpdate};
pub use job::{Company, Job, JobStatus, JobSummary, JobUpdate, NewJob};

/// An entity family the console synchronizes.
pub trait Entity: Clone + Send + Sync + DeserializeOwned + 'static {
  /// Payload for creating one
  type Draft: Serialize + Send + Sync;
  /// Payload for updating one; unset fields are left untouched
  type Patch: Serialize + Send + Sync;

  fn kind() -> EntityKind;

  fn id(&self) -> &str;

  /// Envelope shapes responses for this family may use.
  fn envelope() -> Envelope {
    Envelope::for_kind(Self::kind())
  }

  /// Keys of other families that a write to this one makes stale.
  fn dependents(_operation: Operation, _id: Option<&str>) -> Vec<KeyPattern> {
    Vec::new()
  }
}

/// Entities whose status can be changed on its own (publish, shortlist, ...).
pub trait HasStatus: Entity {
  type Status: Clone + Serialize + Send + Sync + std::fmt::Display;

  fn status(&self) -> &Self::Status;
}

/// Narrows a list request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListScope {
  All,
  /// States of one country
  Country(String),
  /// Applications to one job
  Job(String),
}

impl ListScope {
  pub fn key(&self, kind: EntityKind) -> EntityKey {
    match self {
      ListScope::All => EntityKey::list(kind),
      ListScope::Country(id) | ListScope::Job(id) => EntityKey::scoped_list(kind, id.clone()),
    }
  }
}

/// A normalized list response.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
  pub items: Vec<T>,
  /// Total reported by the server, the item count when it reports none
  pub total: usize,
}

impl<T: Clone> Listing<T> {
  /// Slice one 1-based page out of the list. Pages past the end are empty.
  pub fn page(&self, page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let start = (page - 1).saturating_mul(per_page);
    let items = self
      .items
      .iter()
      .skip(start)
      .take(per_page)
      .cloned()
      .collect();
    Page {
      items,
      total: self.total,
      page,
      per_page,
    }
  }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total: usize,
  pub page: usize,
  pub per_page: usize,
}

impl<T> Page<T> {
  pub fn page_count(&self) -> usize {
    self.total.div_ceil(self.per_page)
  }

  pub fn has_next(&self) -> bool {
    self.page < self.page_count()
  }
}

/// Identifiers arrive as strings from some endpoints and numbers from others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
  Text(String),
  Int(i64),
  Float(f64),
}

impl From<RawId> for String {
  fn from(raw: RawId) -> Self {
    match raw {
      RawId::Text(s) => s,
      RawId::Int(n) => n.to_string(),
      RawId::Float(n) => n.to_string(),
    }
  }
}

pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
  RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn opt_id<'de, D: Deserializer<'de>>(
  deserializer: D,
) -> Result<Option<String>, D::Error> {
  Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}
