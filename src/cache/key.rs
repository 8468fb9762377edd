//! Structural cache keys and prefix patterns.

use std::fmt;

/// Entity families held by the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
  Job,
  State,
  Country,
  Application,
}

impl EntityKind {
  pub const ALL: [EntityKind; 4] = [
    EntityKind::Job,
    EntityKind::State,
    EntityKind::Country,
    EntityKind::Application,
  ];

  /// Singular name, also the envelope field a single entity may be wrapped in.
  pub fn name(self) -> &'static str {
    match self {
      EntityKind::Job => "job",
      EntityKind::State => "state",
      EntityKind::Country => "country",
      EntityKind::Application => "application",
    }
  }

  /// Plural name, also the list-container field of list envelopes.
  pub fn plural(self) -> &'static str {
    match self {
      EntityKind::Job => "jobs",
      EntityKind::State => "states",
      EntityKind::Country => "countries",
      EntityKind::Application => "applications",
    }
  }
}

impl fmt::Display for EntityKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// One element of a key after the entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
  /// The collection of a kind
  List,
  /// A single entity of a kind
  Item,
  /// An identifier: the entity id after `Item`, or a scope id after `List`
  Id(String),
}

impl fmt::Display for Qualifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Qualifier::List => f.write_str("list"),
      Qualifier::Item => f.write_str("item"),
      Qualifier::Id(id) => f.write_str(id),
    }
  }
}

/// Ordered tuple `(kind, qualifiers...)` identifying one cached query.
///
/// Equality is structural. The well-known shapes are:
/// - `(job, list)`: every job
/// - `(job, item, <id>)`: one job
/// - `(state, list, <countryId>)`: states of one country
/// - `(application, list, <jobId>)`: applications to one job
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
  pub kind: EntityKind,
  pub qualifiers: Vec<Qualifier>,
}

impl EntityKey {
  pub fn new(kind: EntityKind, qualifiers: Vec<Qualifier>) -> Self {
    Self { kind, qualifiers }
  }

  pub fn list(kind: EntityKind) -> Self {
    Self::new(kind, vec![Qualifier::List])
  }

  /// A list narrowed by a parent id (states of a country, applications of a job).
  pub fn scoped_list(kind: EntityKind, scope: impl Into<String>) -> Self {
    Self::new(kind, vec![Qualifier::List, Qualifier::Id(scope.into())])
  }

  pub fn item(kind: EntityKind, id: impl Into<String>) -> Self {
    Self::new(kind, vec![Qualifier::Item, Qualifier::Id(id.into())])
  }

  pub fn is_list(&self) -> bool {
    self.qualifiers.first() == Some(&Qualifier::List)
  }
}

impl fmt::Display for EntityKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}", self.kind)?;
    for q in &self.qualifiers {
      write!(f, ", {}", q)?;
    }
    write!(f, ")")
  }
}

/// Prefix over key tuples; matches every key that starts with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPattern {
  pub kind: EntityKind,
  pub prefix: Vec<Qualifier>,
}

impl KeyPattern {
  /// `(kind, *)`: everything cached for a kind.
  pub fn kind(kind: EntityKind) -> Self {
    Self {
      kind,
      prefix: Vec::new(),
    }
  }

  /// Every list of a kind, scoped or not.
  pub fn lists(kind: EntityKind) -> Self {
    Self {
      kind,
      prefix: vec![Qualifier::List],
    }
  }

  /// Lists of a kind narrowed by one parent id.
  pub fn scoped_lists(kind: EntityKind, scope: impl Into<String>) -> Self {
    Self {
      kind,
      prefix: vec![Qualifier::List, Qualifier::Id(scope.into())],
    }
  }

  pub fn item(kind: EntityKind, id: impl Into<String>) -> Self {
    Self {
      kind,
      prefix: vec![Qualifier::Item, Qualifier::Id(id.into())],
    }
  }

  pub fn matches(&self, key: &EntityKey) -> bool {
    self.kind == key.kind && key.qualifiers.starts_with(&self.prefix)
  }
}

impl From<&EntityKey> for KeyPattern {
  fn from(key: &EntityKey) -> Self {
    Self {
      kind: key.kind,
      prefix: key.qualifiers.clone(),
    }
  }
}

impl fmt::Display for KeyPattern {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}", self.kind)?;
    for q in &self.prefix {
      write!(f, ", {}", q)?;
    }
    write!(f, ", *)")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_equality_is_structural() {
    assert_eq!(
      EntityKey::item(EntityKind::Job, "42"),
      EntityKey::new(
        EntityKind::Job,
        vec![Qualifier::Item, Qualifier::Id("42".into())]
      )
    );
    assert_ne!(
      EntityKey::item(EntityKind::Job, "42"),
      EntityKey::item(EntityKind::Application, "42")
    );
  }

  #[test]
  fn test_kind_pattern_matches_all_keys_of_kind() {
    let pattern = KeyPattern::kind(EntityKind::Job);
    assert!(pattern.matches(&EntityKey::list(EntityKind::Job)));
    assert!(pattern.matches(&EntityKey::item(EntityKind::Job, "1")));
    assert!(!pattern.matches(&EntityKey::scoped_list(EntityKind::Application, "1")));
  }

  #[test]
  fn test_lists_pattern_covers_scoped_lists() {
    let pattern = KeyPattern::lists(EntityKind::State);
    assert!(pattern.matches(&EntityKey::list(EntityKind::State)));
    assert!(pattern.matches(&EntityKey::scoped_list(EntityKind::State, "us")));
    assert!(!pattern.matches(&EntityKey::item(EntityKind::State, "ca")));
  }

  #[test]
  fn test_scoped_pattern_is_narrow() {
    let pattern = KeyPattern::scoped_lists(EntityKind::State, "us");
    assert!(pattern.matches(&EntityKey::scoped_list(EntityKind::State, "us")));
    assert!(!pattern.matches(&EntityKey::scoped_list(EntityKind::State, "mx")));
    assert!(!pattern.matches(&EntityKey::list(EntityKind::State)));
  }

  #[test]
  fn test_display() {
    assert_eq!(EntityKey::item(EntityKind::Job, "7").to_string(), "(job, item, 7)");
    assert_eq!(KeyPattern::kind(EntityKind::Job).to_string(), "(job, *)");
  }
}
