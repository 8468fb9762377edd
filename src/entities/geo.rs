//! Geographic reference data: countries, states, cities.

use serde::{Deserialize, Serialize};

use super::{id, opt_id, Entity};
use crate::cache::{EntityKind, KeyPattern};
use crate::mutation::Operation;

/// Country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
  #[serde(deserialize_with = "id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub iso_code: Option<String>,
  #[serde(default)]
  pub phone_code: Option<String>,
}

/// State or province
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
  #[serde(deserialize_with = "id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub code: Option<String>,
  #[serde(default, deserialize_with = "opt_id")]
  pub country_id: Option<String>,
  #[serde(default)]
  pub country: Option<Country>,
}

impl State {
  /// Owning country id, from the flat field or the embedded country.
  pub fn country_id(&self) -> Option<&str> {
    self
      .country_id
      .as_deref()
      .or_else(|| self.country.as_ref().map(|c| c.id.as_str()))
  }
}

/// City, only ever seen embedded in a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
  #[serde(deserialize_with = "id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub state: Option<State>,
}

/// Where a job is located
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
  #[serde(default, deserialize_with = "opt_id")]
  pub id: Option<String>,
  #[serde(default)]
  pub address: Option<String>,
  #[serde(default)]
  pub city: Option<City>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCountry {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub iso_code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub iso_code: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewState {
  pub name: String,
  pub country_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub country_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code: Option<String>,
}

impl Entity for Country {
  type Draft = NewCountry;
  type Patch = CountryUpdate;

  fn kind() -> EntityKind {
    EntityKind::Country
  }

  fn id(&self) -> &str {
    &self.id
  }

  /// States embed their country, so renaming or removing one stales every
  /// cached state, lists and items alike.
  fn dependents(operation: Operation, _id: Option<&str>) -> Vec<KeyPattern> {
    match operation {
      Operation::Update | Operation::Delete => vec![KeyPattern::kind(EntityKind::State)],
      _ => Vec::new(),
    }
  }
}

impl Entity for State {
  type Draft = NewState;
  type Patch = StateUpdate;

  fn kind() -> EntityKind {
    EntityKind::State
  }

  fn id(&self) -> &str {
    &self.id
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_state_country_id_from_either_field() {
    let flat: State =
      serde_json::from_value(json!({"id": 1, "name": "Ontario", "countryId": 2})).unwrap();
    assert_eq!(flat.country_id(), Some("2"));

    let nested: State = serde_json::from_value(json!({
      "id": 1,
      "name": "Ontario",
      "country": {"id": "ca", "name": "Canada"}
    }))
    .unwrap();
    assert_eq!(nested.country_id(), Some("ca"));
  }
}
