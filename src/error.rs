//! Error taxonomy for the synchronization core.
//!
//! Every error crossing the core boundary is one of these values. They are all
//! `Clone` because a single shared fetch hands its outcome to every reader that
//! attached to it.

use thiserror::Error;

use crate::cache::EntityKey;
use crate::mutation::MutationDescriptor;

/// Transport-level or non-2xx failure reported by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_gateway(.status_code, .message))]
pub struct GatewayError {
  /// HTTP status, absent for timeouts and connection failures
  pub status_code: Option<u16>,
  pub message: String,
}

impl GatewayError {
  pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
    Self {
      status_code,
      message: message.into(),
    }
  }

  /// A failure that never reached the server (timeout, refused connection).
  pub fn transport(message: impl Into<String>) -> Self {
    Self::new(None, message)
  }

  pub fn is_not_found(&self) -> bool {
    self.status_code == Some(404)
  }
}

fn describe_gateway(status_code: &Option<u16>, message: &str) -> String {
  match status_code {
    Some(code) => format!("HTTP {}: {}", code, message),
    None => message.to_string(),
  }
}

/// The response did not match any recognized envelope, or its payload could not
/// be decoded into the expected entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
  #[error("no {expected} found in response (tried: {})", .attempted.join(", "))]
  NoShape {
    expected: &'static str,
    attempted: Vec<&'static str>,
  },
  #[error("failed to decode {entity}: {message}")]
  Decode {
    entity: &'static str,
    message: String,
  },
}

/// Failure of a cached read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
  #[error(transparent)]
  Gateway(#[from] GatewayError),
  #[error(transparent)]
  Normalization(#[from] NormalizationError),
  /// The key already holds a value of a different type.
  #[error("cache entry {key} holds a different value type")]
  TypeMismatch { key: EntityKey },
}

impl ReadError {
  pub fn gateway(&self) -> Option<&GatewayError> {
    match self {
      ReadError::Gateway(e) => Some(e),
      _ => None,
    }
  }
}

/// Failure of a write, carrying the operation that was attempted.
#[derive(Debug, Clone, Error)]
pub enum MutationError {
  #[error("Failed to {}: {source}", .descriptor.describe())]
  Gateway {
    descriptor: MutationDescriptor,
    #[source]
    source: GatewayError,
  },
  /// The write succeeded server-side but its response could not be read back.
  #[error("Failed to read result of {}: {source}", .descriptor.describe())]
  Normalization {
    descriptor: MutationDescriptor,
    #[source]
    source: NormalizationError,
  },
}

impl MutationError {
  pub fn descriptor(&self) -> &MutationDescriptor {
    match self {
      MutationError::Gateway { descriptor, .. } | MutationError::Normalization { descriptor, .. } => {
        descriptor
      }
    }
  }

  pub fn gateway(&self) -> Option<&GatewayError> {
    match self {
      MutationError::Gateway { source, .. } => Some(source),
      MutationError::Normalization { .. } => None,
    }
  }
}
