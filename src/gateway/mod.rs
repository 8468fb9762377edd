//! Remote entity gateway: the only place that talks to the network.
//!
//! Gateways return the raw JSON body untouched. Turning it into entities is
//! the normalizer's job.

mod http;
#[cfg(test)]
pub(crate) mod mock;
pub mod routes;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;

pub use http::HttpGateway;

/// One call against the remote API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  /// Path segments below the API base URL, unencoded
  pub segments: Vec<String>,
  pub query: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl ApiRequest {
  pub fn new<I, S>(method: Method, segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      method,
      segments: segments.into_iter().map(Into::into).collect(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }

  /// Attach a JSON body. Encoding failures surface as a gateway error since
  /// the request never leaves the process.
  pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, GatewayError> {
    let body = serde_json::to_value(body)
      .map_err(|e| GatewayError::transport(format!("Failed to encode request body: {}", e)))?;
    self.body = Some(body);
    Ok(self)
  }

  /// `/jobs/7/status`
  pub fn path(&self) -> String {
    format!("/{}", self.segments.join("/"))
  }
}

impl fmt::Display for ApiRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.method, self.path())?;
    for (i, (key, value)) in self.query.iter().enumerate() {
      let sep = if i == 0 { '?' } else { '&' };
      write!(f, "{}{}={}", sep, key, value)?;
    }
    Ok(())
  }
}

/// Transport for the remote API.
#[async_trait]
pub trait Gateway: Send + Sync {
  async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError>;
}

#[async_trait]
impl<G: Gateway + ?Sized> Gateway for Arc<G> {
  async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
    (**self).send(request).await
  }
}
