use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::JobSummary;
use super::{id, opt_id, Entity, HasStatus};
use crate::cache::EntityKind;

/// Candidate application to a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
  #[serde(deserialize_with = "id")]
  pub id: String,
  #[serde(default, deserialize_with = "opt_id")]
  pub job_id: Option<String>,
  pub applicant_name: String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub resume_url: Option<String>,
  #[serde(default)]
  pub cover_letter: Option<String>,
  #[serde(default)]
  pub status: ApplicationStatus,
  #[serde(default)]
  pub job: Option<JobSummary>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Application {
  /// Job applied to, from the flat field or the embedded job.
  pub fn job_id(&self) -> Option<&str> {
    self
      .job_id
      .as_deref()
      .or_else(|| self.job.as_ref().and_then(|j| j.id.as_deref()))
  }
}

/// Review status of an application. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ApplicationStatus {
  #[default]
  Pending,
  Reviewing,
  Shortlisted,
  Rejected,
  Hired,
  Other(String),
}

impl ApplicationStatus {
  pub fn as_str(&self) -> &str {
    match self {
      ApplicationStatus::Pending => "PENDING",
      ApplicationStatus::Reviewing => "REVIEWING",
      ApplicationStatus::Shortlisted => "SHORTLISTED",
      ApplicationStatus::Rejected => "REJECTED",
      ApplicationStatus::Hired => "HIRED",
      ApplicationStatus::Other(s) => s,
    }
  }
}

impl From<String> for ApplicationStatus {
  fn from(s: String) -> Self {
    match s.to_uppercase().as_str() {
      "PENDING" => ApplicationStatus::Pending,
      "REVIEWING" => ApplicationStatus::Reviewing,
      "SHORTLISTED" => ApplicationStatus::Shortlisted,
      "REJECTED" => ApplicationStatus::Rejected,
      "HIRED" => ApplicationStatus::Hired,
      _ => ApplicationStatus::Other(s),
    }
  }
}

impl From<ApplicationStatus> for String {
  fn from(status: ApplicationStatus) -> Self {
    status.as_str().to_string()
  }
}

impl FromStr for ApplicationStatus {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(ApplicationStatus::from(s.to_string()))
  }
}

impl fmt::Display for ApplicationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
  pub job_id: String,
  pub applicant_name: String,
  pub email: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resume_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cover_letter: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub applicant_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
}

impl Entity for Application {
  type Draft = NewApplication;
  type Patch = ApplicationUpdate;

  fn kind() -> EntityKind {
    EntityKind::Application
  }

  fn id(&self) -> &str {
    &self.id
  }
}

impl HasStatus for Application {
  type Status = ApplicationStatus;

  fn status(&self) -> &ApplicationStatus {
    &self.status
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_application_job_from_embedded_job() {
    let application: Application = serde_json::from_value(json!({
      "id": 3,
      "applicantName": "Ada Lovelace",
      "email": "ada@example.com",
      "status": "shortlisted",
      "job": {"id": 17, "title": "Backend Engineer"}
    }))
    .unwrap();

    assert_eq!(application.job_id(), Some("17"));
    assert_eq!(application.status, ApplicationStatus::Shortlisted);
  }
}
