//! Writes against the remote API and the cache invalidation they imply.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{EntityKind, KeyPattern, QueryCache};
use crate::error::{GatewayError, MutationError};
use crate::gateway::{ApiRequest, Gateway};
use crate::normalize::{normalize_one, Envelope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  Create,
  Update,
  Delete,
  /// Restricted update touching only the status field
  StatusChange,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Operation::Create => "create",
      Operation::Update => "update",
      Operation::Delete => "delete",
      Operation::StatusChange => "change status of",
    };
    f.write_str(name)
  }
}

/// What a write does and which cached keys it makes stale.
///
/// Every descriptor invalidates the lists of its target kind, and the target
/// item when the operation has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationDescriptor {
  pub target: EntityKind,
  pub operation: Operation,
  pub id: Option<String>,
  invalidates: Vec<KeyPattern>,
}

impl MutationDescriptor {
  pub fn create(target: EntityKind) -> Self {
    Self {
      target,
      operation: Operation::Create,
      id: None,
      invalidates: vec![KeyPattern::lists(target)],
    }
  }

  pub fn update(target: EntityKind, id: impl Into<String>) -> Self {
    Self::on_item(target, Operation::Update, id.into())
  }

  pub fn delete(target: EntityKind, id: impl Into<String>) -> Self {
    Self::on_item(target, Operation::Delete, id.into())
  }

  pub fn status_change(target: EntityKind, id: impl Into<String>) -> Self {
    Self::on_item(target, Operation::StatusChange, id.into())
  }

  fn on_item(target: EntityKind, operation: Operation, id: String) -> Self {
    Self {
      target,
      operation,
      invalidates: vec![KeyPattern::lists(target), KeyPattern::item(target, id.as_str())],
      id: Some(id),
    }
  }

  /// Add keys of other families the write makes stale.
  ///
  /// Status changes never reach past their own kind; such patterns are dropped.
  pub fn also_invalidates(mut self, patterns: impl IntoIterator<Item = KeyPattern>) -> Self {
    for pattern in patterns {
      if self.operation == Operation::StatusChange && pattern.kind != self.target {
        debug!(%pattern, target = %self.target, "status change ignores cross-entity pattern");
        continue;
      }
      if !self.invalidates.contains(&pattern) {
        self.invalidates.push(pattern);
      }
    }
    self
  }

  pub fn invalidates(&self) -> &[KeyPattern] {
    &self.invalidates
  }

  /// `create state`, `change status of job 7`
  pub fn describe(&self) -> String {
    match &self.id {
      Some(id) => format!("{} {} {}", self.operation, self.target, id),
      None => format!("{} {}", self.operation, self.target),
    }
  }
}

/// Sends writes and, once the server accepted them, invalidates what they
/// touched. Failed writes leave the cache alone and are never retried.
#[derive(Clone)]
pub struct MutationCoordinator {
  gateway: Arc<dyn Gateway>,
  cache: QueryCache,
}

impl MutationCoordinator {
  pub fn new(gateway: Arc<dyn Gateway>, cache: QueryCache) -> Self {
    Self { gateway, cache }
  }

  /// Run a write whose response carries the resulting entity.
  pub async fn execute<T: DeserializeOwned>(
    &self,
    descriptor: MutationDescriptor,
    request: ApiRequest,
    envelope: &Envelope,
  ) -> Result<T, MutationError> {
    let raw = self.dispatch(&descriptor, request).await?;
    normalize_one(raw, envelope).map_err(|source| {
      warn!(operation = %descriptor.describe(), error = %source, "unreadable mutation response");
      MutationError::Normalization { descriptor, source }
    })
  }

  /// Run a write whose response body is irrelevant (deletes).
  pub async fn execute_discarding(
    &self,
    descriptor: MutationDescriptor,
    request: ApiRequest,
  ) -> Result<(), MutationError> {
    self.dispatch(&descriptor, request).await.map(|_| ())
  }

  async fn dispatch(
    &self,
    descriptor: &MutationDescriptor,
    request: ApiRequest,
  ) -> Result<Value, MutationError> {
    debug!(operation = %descriptor.describe(), %request, "dispatching mutation");

    match self.gateway.send(request).await {
      Ok(raw) => {
        let invalidated: usize = descriptor
          .invalidates()
          .iter()
          .map(|pattern| self.cache.invalidate(pattern))
          .sum();
        info!(operation = %descriptor.describe(), invalidated, "mutation succeeded");
        Ok(raw)
      }
      Err(source) => {
        warn!(operation = %descriptor.describe(), error = %source, "mutation failed");
        Err(MutationError::Gateway {
          descriptor: descriptor.clone(),
          source,
        })
      }
    }
  }
}

/// A request body that could not be encoded fails the write before sending.
pub(crate) fn rejected(descriptor: &MutationDescriptor, source: GatewayError) -> MutationError {
  warn!(operation = %descriptor.describe(), error = %source, "mutation not sent");
  MutationError::Gateway {
    descriptor: descriptor.clone(),
    source,
  }
}
