//! Extraction of canonical entities and lists from response envelopes.
//!
//! Endpoints disagree on how they wrap payloads. Instead of special-casing
//! endpoints, every response goes through one ordered set of rules; the first
//! rule that matches wins:
//!
//! 1. an array is the list itself
//! 2. a declared list-container field (`applications`, `items`) is the list,
//!    with an adjacent total
//! 3. a `data` field is unwrapped once and the rules are applied to it
//! 4. a field named after the entity (`job`, `state`) is the entity
//! 5. the object itself is the entity

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::cache::EntityKind;
use crate::entities::Listing;
use crate::error::NormalizationError;

/// Envelope vocabulary of one entity family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
  /// Field a single entity may be wrapped in
  pub singular: &'static str,
  /// Fields a list may be wrapped in, in order of preference
  pub list_containers: Vec<&'static str>,
  /// Field holding the server-side total next to a list
  pub total_field: &'static str,
}

impl Envelope {
  pub fn for_kind(kind: EntityKind) -> Self {
    Self {
      singular: kind.name(),
      list_containers: vec![kind.plural(), "items"],
      total_field: "total",
    }
  }
}

/// Shape-independent result of normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
  One {
    value: Value,
    /// Rule that produced it
    via: &'static str,
  },
  Many {
    items: Vec<Value>,
    total: usize,
    via: &'static str,
  },
}

/// Apply the envelope rules to a raw response.
pub fn normalize(raw: Value, envelope: &Envelope) -> Result<Normalized, NormalizationError> {
  let mut attempted = Vec::new();
  resolve(raw, envelope, None, 0, &mut attempted)
}

fn resolve(
  raw: Value,
  envelope: &Envelope,
  outer_total: Option<usize>,
  depth: u8,
  attempted: &mut Vec<&'static str>,
) -> Result<Normalized, NormalizationError> {
  attempted.push("array");
  let mut map = match raw {
    Value::Array(items) => {
      let total = outer_total.unwrap_or(items.len());
      return Ok(Normalized::Many {
        items,
        total,
        via: "array",
      });
    }
    Value::Object(map) => map,
    _ => return Err(no_shape(envelope.singular, attempted)),
  };

  for &container in &envelope.list_containers {
    attempted.push(container);
    if let Some(Value::Array(_)) = map.get(container) {
      let total = read_total(&map, envelope).or(outer_total);
      if let Some(Value::Array(items)) = map.remove(container) {
        let total = total.unwrap_or(items.len());
        return Ok(Normalized::Many {
          items,
          total,
          via: container,
        });
      }
    }
  }

  // Only one level of `data` wrapping is unwrapped.
  if depth == 0 {
    attempted.push("data");
    if let Some(inner) = map.remove("data") {
      let total = read_total(&map, envelope).or(outer_total);
      return resolve(inner, envelope, total, depth + 1, attempted);
    }
  }

  attempted.push(envelope.singular);
  match map.remove(envelope.singular) {
    Some(value @ Value::Object(_)) => {
      return Ok(Normalized::One {
        value,
        via: envelope.singular,
      });
    }
    Some(Value::Null) => return Err(no_shape(envelope.singular, attempted)),
    // Not a wrapper after all, keep it as a field of the entity.
    Some(other) => {
      map.insert(envelope.singular.to_string(), other);
    }
    None => {}
  }

  attempted.push("raw");
  if map.is_empty() {
    return Err(no_shape(envelope.singular, attempted));
  }
  Ok(Normalized::One {
    value: Value::Object(map),
    via: "raw",
  })
}

/// Totals may be sent as numbers or numeric strings.
fn read_total(map: &Map<String, Value>, envelope: &Envelope) -> Option<usize> {
  match map.get(envelope.total_field)? {
    Value::Number(n) => n.as_u64().map(|n| n as usize),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn no_shape(expected: &'static str, attempted: &[&'static str]) -> NormalizationError {
  NormalizationError::NoShape {
    expected,
    attempted: attempted.to_vec(),
  }
}

/// Normalize a response expected to hold one entity.
pub fn normalize_one<T: DeserializeOwned>(
  raw: Value,
  envelope: &Envelope,
) -> Result<T, NormalizationError> {
  match normalize(raw, envelope)? {
    Normalized::One { value, .. } => decode(value, envelope.singular),
    Normalized::Many { via, .. } => Err(NormalizationError::NoShape {
      expected: envelope.singular,
      attempted: vec![via],
    }),
  }
}

/// Normalize a response expected to hold a list.
pub fn normalize_list<T: DeserializeOwned>(
  raw: Value,
  envelope: &Envelope,
) -> Result<Listing<T>, NormalizationError> {
  match normalize(raw, envelope)? {
    Normalized::Many { items, total, .. } => {
      let items = items
        .into_iter()
        .map(|item| decode(item, envelope.singular))
        .collect::<Result<Vec<T>, _>>()?;
      Ok(Listing { items, total })
    }
    Normalized::One { via, .. } => Err(NormalizationError::NoShape {
      expected: envelope
        .list_containers
        .first()
        .copied()
        .unwrap_or("list"),
      attempted: vec![via],
    }),
  }
}

fn decode<T: DeserializeOwned>(value: Value, entity: &'static str) -> Result<T, NormalizationError> {
  serde_json::from_value(value).map_err(|e| NormalizationError::Decode {
    entity,
    message: e.to_string(),
  })
}
