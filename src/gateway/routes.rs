//! Request builders, one per entity family and operation.

use reqwest::Method;
use serde::Serialize;

use super::ApiRequest;
use crate::cache::EntityKind;
use crate::entities::ListScope;
use crate::error::GatewayError;

fn collection(kind: EntityKind) -> &'static str {
  kind.plural()
}

/// List a family, narrowed by scope.
///
/// Applications of one job live under the job; other scopes are query filters.
pub fn list(kind: EntityKind, scope: &ListScope) -> ApiRequest {
  match (kind, scope) {
    (_, ListScope::All) => ApiRequest::new(Method::GET, [collection(kind)]),
    (EntityKind::Application, ListScope::Job(job_id)) => ApiRequest::new(
      Method::GET,
      [collection(EntityKind::Job), job_id.as_str(), collection(kind)],
    ),
    (_, ListScope::Job(job_id)) => {
      ApiRequest::new(Method::GET, [collection(kind)]).with_query("jobId", job_id.as_str())
    }
    (_, ListScope::Country(country_id)) => {
      ApiRequest::new(Method::GET, [collection(kind)]).with_query("countryId", country_id.as_str())
    }
  }
}

pub fn get(kind: EntityKind, id: &str) -> ApiRequest {
  ApiRequest::new(Method::GET, [collection(kind), id])
}

pub fn create(kind: EntityKind, draft: &impl Serialize) -> Result<ApiRequest, GatewayError> {
  ApiRequest::new(Method::POST, [collection(kind)]).with_json(draft)
}

pub fn update(
  kind: EntityKind,
  id: &str,
  patch: &impl Serialize,
) -> Result<ApiRequest, GatewayError> {
  ApiRequest::new(Method::PUT, [collection(kind), id]).with_json(patch)
}

pub fn delete(kind: EntityKind, id: &str) -> ApiRequest {
  ApiRequest::new(Method::DELETE, [collection(kind), id])
}

pub fn set_status(
  kind: EntityKind,
  id: &str,
  status: &impl Serialize,
) -> Result<ApiRequest, GatewayError> {
  ApiRequest::new(Method::PATCH, [collection(kind), id, "status"])
    .with_json(&serde_json::json!({ "status": status }))
}
