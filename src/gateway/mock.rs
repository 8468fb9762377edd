//! Scripted gateway for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ApiRequest, Gateway};
use crate::error::GatewayError;

type Reply = Result<Value, GatewayError>;

#[derive(Default)]
struct Route {
  replies: VecDeque<Reply>,
  delay: Duration,
}

/// Replies to requests by their `METHOD /path?query` line.
///
/// Replies queued for a route are handed out in order; the last one repeats.
/// Unscripted routes answer 404.
#[derive(Default)]
pub struct MockGateway {
  routes: Mutex<HashMap<String, Route>>,
  requests: Mutex<Vec<ApiRequest>>,
}

impl MockGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn on(&self, route: &str, body: Value) -> &Self {
    self.push(route, Ok(body), None)
  }

  pub fn on_delayed(&self, route: &str, body: Value, delay: Duration) -> &Self {
    self.push(route, Ok(body), Some(delay))
  }

  pub fn fail(&self, route: &str, status: u16, message: &str) -> &Self {
    self.push(route, Err(GatewayError::new(Some(status), message)), None)
  }

  fn push(&self, route: &str, reply: Reply, delay: Option<Duration>) -> &Self {
    let mut routes = self.routes.lock().unwrap();
    let entry = routes.entry(route.to_string()).or_default();
    entry.replies.push_back(reply);
    if let Some(delay) = delay {
      entry.delay = delay;
    }
    self
  }

  /// Number of requests received for a route line.
  pub fn calls(&self, route: &str) -> usize {
    self
      .requests
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.to_string() == route)
      .count()
  }
}

#[async_trait]
impl Gateway for MockGateway {
  async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
    let line = request.to_string();
    self.requests.lock().unwrap().push(request);

    let (reply, delay) = {
      let mut routes = self.routes.lock().unwrap();
      match routes.get_mut(&line) {
        Some(route) => {
          let reply = if route.replies.len() > 1 {
            route.replies.pop_front()
          } else {
            route.replies.front().cloned()
          };
          (reply, route.delay)
        }
        None => (None, Duration::ZERO),
      }
    };

    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    reply.unwrap_or_else(|| Err(GatewayError::new(Some(404), format!("no route for {}", line))))
  }
}
