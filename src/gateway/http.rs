use std::time::Duration;

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::{ApiRequest, Gateway};
use crate::config::{ApiConfig, Config};
use crate::error::GatewayError;

/// Job-board API client over HTTPS with a bearer credential
#[derive(Clone)]
pub struct HttpGateway {
  client: reqwest::Client,
  base: Url,
  token: String,
}

impl HttpGateway {
  /// Build a client from configuration, reading the credential from the environment.
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let token = Config::get_api_token()?;
    Self::with_token(config, token)
  }

  pub fn with_token(config: &ApiConfig, token: String) -> Result<Self> {
    let base = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("API url {} cannot be used as a base", config.url));
    }

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  /// Resolve a request against the base URL, encoding every path segment.
  fn url(&self, request: &ApiRequest) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
      segments.pop_if_empty().extend(&request.segments);
    }
    if !request.query.is_empty() {
      url.query_pairs_mut().extend_pairs(&request.query);
    }
    url
  }
}

#[async_trait]
impl Gateway for HttpGateway {
  async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
    let url = self.url(&request);
    debug!(method = %request.method, %url, "sending request");

    let mut builder = self
      .client
      .request(request.method.clone(), url)
      .bearer_auth(&self.token);
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await.map_err(|e| {
      let err = transport_error(&e);
      warn!(%request, error = %err, "request failed");
      err
    })?;

    let status = response.status();
    let bytes = response.bytes().await.map_err(|e| transport_error(&e))?;

    if !status.is_success() {
      let err = GatewayError::new(Some(status.as_u16()), error_message(status, &bytes));
      warn!(%request, error = %err, "request rejected");
      return Err(err);
    }

    parse_body(status, &bytes)
  }
}

fn transport_error(e: &reqwest::Error) -> GatewayError {
  let status = e.status().map(|s| s.as_u16());
  if e.is_timeout() {
    GatewayError::new(status, "request timed out")
  } else if e.is_connect() {
    GatewayError::new(status, format!("connection failed: {}", e))
  } else {
    GatewayError::new(status, e.to_string())
  }
}

/// Empty bodies (204, bare 200) read as `null`.
fn parse_body(status: StatusCode, bytes: &[u8]) -> Result<Value, GatewayError> {
  if bytes.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Null);
  }
  serde_json::from_slice(bytes).map_err(|e| {
    GatewayError::new(
      Some(status.as_u16()),
      format!("Failed to parse response body: {}", e),
    )
  })
}

/// Best human-readable message from an error response.
///
/// Error bodies can be:
/// - `{"message": "..."}` or `{"error": "..."}`
/// - `{"error": {"message": "..."}}`
/// - plain text
/// - empty
fn error_message(status: StatusCode, bytes: &[u8]) -> String {
  if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
    let message = body
      .get("message")
      .and_then(|v| v.as_str())
      .or_else(|| body.get("error").and_then(|v| v.as_str()))
      .or_else(|| {
        body
          .get("error")
          .and_then(|v| v.get("message"))
          .and_then(|v| v.as_str())
      });
    if let Some(message) = message {
      return message.to_string();
    }
  }

  let text = String::from_utf8_lossy(bytes);
  let text = text.trim();
  if !text.is_empty() && text.len() <= 200 && !text.starts_with('{') && !text.starts_with('<') {
    return text.to_string();
  }

  status
    .canonical_reason()
    .unwrap_or("request failed")
    .to_string()
}
