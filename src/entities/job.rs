use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Location;
use super::{id, opt_id, Entity, HasStatus};
use crate::cache::{EntityKind, KeyPattern};
use crate::mutation::Operation;

/// Job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
  #[serde(deserialize_with = "id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub status: JobStatus,
  #[serde(default)]
  pub employment_type: Option<String>,
  #[serde(default)]
  pub salary_min: Option<f64>,
  #[serde(default)]
  pub salary_max: Option<f64>,
  #[serde(default)]
  pub company: Option<Company>,
  #[serde(default)]
  pub location: Option<Location>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Company offering a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
  #[serde(deserialize_with = "id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub logo_url: Option<String>,
}

/// Publication status of a job. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
  #[default]
  Draft,
  Published,
  Closed,
  Archived,
  Other(String),
}

impl JobStatus {
  pub fn as_str(&self) -> &str {
    match self {
      JobStatus::Draft => "DRAFT",
      JobStatus::Published => "PUBLISHED",
      JobStatus::Closed => "CLOSED",
      JobStatus::Archived => "ARCHIVED",
      JobStatus::Other(s) => s,
    }
  }
}

impl From<String> for JobStatus {
  fn from(s: String) -> Self {
    match s.to_uppercase().as_str() {
      "DRAFT" => JobStatus::Draft,
      "PUBLISHED" => JobStatus::Published,
      "CLOSED" => JobStatus::Closed,
      "ARCHIVED" => JobStatus::Archived,
      _ => JobStatus::Other(s),
    }
  }
}

impl From<JobStatus> for String {
  fn from(status: JobStatus) -> Self {
    status.as_str().to_string()
  }
}

impl FromStr for JobStatus {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(JobStatus::from(s.to_string()))
  }
}

impl fmt::Display for JobStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

/// Payload for posting a job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
  pub title: String,
  pub company_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub employment_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub city_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salary_min: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salary_max: Option<f64>,
}

/// Partial update of a job
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub employment_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub city_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salary_min: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub salary_max: Option<f64>,
}

impl Entity for Job {
  type Draft = NewJob;
  type Patch = JobUpdate;

  fn kind() -> EntityKind {
    EntityKind::Job
  }

  fn id(&self) -> &str {
    &self.id
  }

  /// Applications embed a summary of their job, so an edit reaches every
  /// cached application. A delete only drops the job's own application lists.
  fn dependents(operation: Operation, id: Option<&str>) -> Vec<KeyPattern> {
    match (operation, id) {
      (Operation::Update, _) => vec![KeyPattern::kind(EntityKind::Application)],
      (Operation::Delete, Some(id)) => vec![KeyPattern::scoped_lists(EntityKind::Application, id)],
      _ => Vec::new(),
    }
  }
}

impl HasStatus for Job {
  type Status = JobStatus;

  fn status(&self) -> &JobStatus {
    &self.status
  }
}

/// Job as embedded in an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
  #[serde(default, deserialize_with = "opt_id")]
  pub id: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
}
