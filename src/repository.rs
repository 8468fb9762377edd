//! Per-family entry points the console and its views work against.
//!
//! Reads go through the shared query cache, writes through the mutation
//! coordinator. Both normalize whatever envelope the server used, so callers
//! only ever see typed entities, listings and errors.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use crate::cache::{EntityKey, EntityKind, QueryCache};
use crate::config::CacheConfig;
use crate::entities::{
  Application, Country, Entity, HasStatus, Job, ListScope, Listing, Page, State,
};
use crate::error::{MutationError, ReadError};
use crate::gateway::{routes, Gateway};
use crate::mutation::{self, MutationCoordinator, MutationDescriptor, Operation};
use crate::normalize::{normalize_list, normalize_one};
use crate::query::Subscription;

type Fetch<T> = BoxFuture<'static, Result<T, ReadError>>;

/// Reads and writes of one entity family.
pub struct Repository<E> {
  gateway: Arc<dyn Gateway>,
  cache: QueryCache,
  mutations: MutationCoordinator,
  freshness: Duration,
  per_page: usize,
  _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
  fn clone(&self) -> Self {
    Self {
      gateway: Arc::clone(&self.gateway),
      cache: self.cache.clone(),
      mutations: self.mutations.clone(),
      freshness: self.freshness,
      per_page: self.per_page,
      _entity: PhantomData,
    }
  }
}

impl<E: Entity> Repository<E> {
  pub fn new(
    gateway: Arc<dyn Gateway>,
    cache: QueryCache,
    freshness: Duration,
    per_page: usize,
  ) -> Self {
    Self {
      mutations: MutationCoordinator::new(Arc::clone(&gateway), cache.clone()),
      gateway,
      cache,
      freshness,
      per_page: per_page.max(1),
      _entity: PhantomData,
    }
  }

  pub fn kind(&self) -> EntityKind {
    E::kind()
  }

  pub fn per_page(&self) -> usize {
    self.per_page
  }

  /// The whole list for a scope, served from cache when fresh.
  pub async fn list(&self, scope: ListScope) -> Result<Listing<E>, ReadError> {
    let key = scope.key(E::kind());
    let fetcher = Self::list_fetcher(Arc::clone(&self.gateway), scope);
    self.cache.read(key, self.freshness, fetcher).await
  }

  /// One 1-based page of a list, sliced from the cached list.
  pub async fn page(&self, scope: ListScope, page: usize) -> Result<Page<E>, ReadError> {
    Ok(self.list(scope).await?.page(page, self.per_page))
  }

  pub async fn get_by_id(&self, id: &str) -> Result<E, ReadError> {
    let key = EntityKey::item(E::kind(), id);
    let fetcher = Self::item_fetcher(Arc::clone(&self.gateway), id.to_string());
    self.cache.read(key, self.freshness, fetcher).await
  }

  pub async fn create(&self, draft: &E::Draft) -> Result<E, MutationError> {
    let descriptor = MutationDescriptor::create(E::kind())
      .also_invalidates(E::dependents(Operation::Create, None));
    let request =
      routes::create(E::kind(), draft).map_err(|e| mutation::rejected(&descriptor, e))?;
    self.mutations.execute(descriptor, request, &E::envelope()).await
  }

  /// Apply a partial update; unset fields of `patch` are left as they are.
  pub async fn update(&self, id: &str, patch: &E::Patch) -> Result<E, MutationError> {
    let descriptor = MutationDescriptor::update(E::kind(), id)
      .also_invalidates(E::dependents(Operation::Update, Some(id)));
    let request =
      routes::update(E::kind(), id, patch).map_err(|e| mutation::rejected(&descriptor, e))?;
    self.mutations.execute(descriptor, request, &E::envelope()).await
  }

  pub async fn delete(&self, id: &str) -> Result<(), MutationError> {
    let descriptor = MutationDescriptor::delete(E::kind(), id)
      .also_invalidates(E::dependents(Operation::Delete, Some(id)));
    self
      .mutations
      .execute_discarding(descriptor, routes::delete(E::kind(), id))
      .await
  }

  /// Re-trigger the fetch of a list. Returns false when it was never read.
  pub fn refresh(&self, scope: &ListScope) -> bool {
    self.cache.refetch(&scope.key(E::kind()))
  }

  pub fn refresh_item(&self, id: &str) -> bool {
    self.cache.refetch(&EntityKey::item(E::kind(), id))
  }

  /// Keep a list observed and follow its transitions.
  pub fn watch_list(&self, scope: ListScope) -> Subscription<Listing<E>> {
    let key = scope.key(E::kind());
    debug!(%key, "watching list");
    let fetcher = Self::list_fetcher(Arc::clone(&self.gateway), scope);
    Subscription::new(&self.cache, key, self.freshness, fetcher)
  }

  pub fn watch(&self, id: &str) -> Subscription<E> {
    let key = EntityKey::item(E::kind(), id);
    debug!(%key, "watching item");
    let fetcher = Self::item_fetcher(Arc::clone(&self.gateway), id.to_string());
    Subscription::new(&self.cache, key, self.freshness, fetcher)
  }

  fn list_fetcher(
    gateway: Arc<dyn Gateway>,
    scope: ListScope,
  ) -> impl Fn() -> Fetch<Listing<E>> + Send + Sync + 'static {
    move || {
      let gateway = Arc::clone(&gateway);
      let request = routes::list(E::kind(), &scope);
      async move {
        let raw = gateway.send(request).await?;
        Ok::<_, ReadError>(normalize_list(raw, &E::envelope())?)
      }
      .boxed()
    }
  }

  fn item_fetcher(
    gateway: Arc<dyn Gateway>,
    id: String,
  ) -> impl Fn() -> Fetch<E> + Send + Sync + 'static {
    move || {
      let gateway = Arc::clone(&gateway);
      let request = routes::get(E::kind(), &id);
      async move {
        let raw = gateway.send(request).await?;
        Ok::<_, ReadError>(normalize_one(raw, &E::envelope())?)
      }
      .boxed()
    }
  }
}

impl<E: HasStatus> Repository<E> {
  /// Change only the status of one entity (publish a job, shortlist an
  /// application). Invalidates nothing outside the entity's own family.
  pub async fn set_status(&self, id: &str, status: &E::Status) -> Result<E, MutationError> {
    let descriptor = MutationDescriptor::status_change(E::kind(), id);
    let request =
      routes::set_status(E::kind(), id, status).map_err(|e| mutation::rejected(&descriptor, e))?;
    debug!(%status, "changing status");
    self.mutations.execute(descriptor, request, &E::envelope()).await
  }
}

/// Every family of the admin console over one shared cache.
#[derive(Clone)]
pub struct Console {
  pub cache: QueryCache,
  pub jobs: Repository<Job>,
  pub states: Repository<State>,
  pub countries: Repository<Country>,
  pub applications: Repository<Application>,
}

impl Console {
  pub fn new(gateway: Arc<dyn Gateway>, config: &CacheConfig, per_page: usize) -> Self {
    let cache = QueryCache::new();
    Self {
      jobs: repository(&gateway, &cache, config, per_page),
      states: repository(&gateway, &cache, config, per_page),
      countries: repository(&gateway, &cache, config, per_page),
      applications: repository(&gateway, &cache, config, per_page),
      cache,
    }
  }
}

fn repository<E: Entity>(
  gateway: &Arc<dyn Gateway>,
  cache: &QueryCache,
  config: &CacheConfig,
  per_page: usize,
) -> Repository<E> {
  Repository::new(
    Arc::clone(gateway),
    cache.clone(),
    config.freshness(E::kind()),
    per_page,
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::EntryState;
  use crate::entities::{ApplicationStatus, CountryUpdate, JobStatus, JobUpdate, NewCountry};
  use crate::gateway::mock::MockGateway;
  use serde_json::{json, Value};

  fn console(gateway: &Arc<MockGateway>) -> Console {
    let gateway: Arc<dyn Gateway> = gateway.clone();
    Console::new(gateway, &CacheConfig::default(), 10)
  }

  fn jobs_payload(published: Option<&str>) -> Value {
    let jobs: Vec<Value> = (1..=37)
      .map(|n| {
        let status = if Some(n.to_string().as_str()) == published {
          "PUBLISHED"
        } else {
          "DRAFT"
        };
        json!({"id": n, "title": format!("Job {}", n), "status": status})
      })
      .collect();
    json!({"data": jobs, "total": 37})
  }

  #[tokio::test]
  async fn test_list_detail_and_status_change_round_trip() {
    let gateway = Arc::new(MockGateway::new());
    gateway
      .on("GET /jobs", jobs_payload(None))
      .on("GET /jobs", jobs_payload(Some("7")));
    gateway.on("GET /jobs/7", json!({"id": 7, "title": "Job 7", "status": "DRAFT"}));
    gateway.on(
      "PATCH /jobs/7/status",
      json!({"data": {"id": 7, "title": "Job 7", "status": "PUBLISHED"}}),
    );
    let console = console(&gateway);

    let page = console.jobs.page(ListScope::All, 1).await.unwrap();
    assert_eq!(page.total, 37);
    assert_eq!(page.items.len(), 10);
    assert_eq!(page.page_count(), 4);

    let job = console.jobs.get_by_id("7").await.unwrap();
    assert_eq!(job.id, "7");
    assert_eq!(job.title, "Job 7");
    assert_eq!(job.status, JobStatus::Draft);

    let updated = console
      .jobs
      .set_status("7", &JobStatus::Published)
      .await
      .unwrap();
    assert_eq!(updated.status, JobStatus::Published);

    let page = console.jobs.page(ListScope::All, 1).await.unwrap();
    let job = page.items.iter().find(|j| j.id == "7").unwrap();
    assert_eq!(job.status, JobStatus::Published);
    assert_eq!(gateway.calls("GET /jobs"), 2);
  }

  #[tokio::test]
  async fn test_pages_share_one_cached_list() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on("GET /jobs", jobs_payload(None));
    let console = console(&gateway);

    let first = console.jobs.page(ListScope::All, 1).await.unwrap();
    let last = console.jobs.page(ListScope::All, 4).await.unwrap();

    assert_eq!(first.items[0].id, "1");
    assert_eq!(last.items.len(), 7);
    assert!(!last.has_next());
    assert_eq!(gateway.calls("GET /jobs"), 1);
  }

  #[tokio::test]
  async fn test_failed_status_change_keeps_cached_list() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on("GET /jobs", jobs_payload(None));
    gateway.fail("PATCH /jobs/7/status", 500, "database unavailable");
    let console = console(&gateway);

    console.jobs.list(ListScope::All).await.unwrap();
    let err = console
      .jobs
      .set_status("7", &JobStatus::Published)
      .await
      .unwrap_err();

    assert_eq!(
      err.to_string(),
      "Failed to change status of job 7: HTTP 500: database unavailable"
    );
    assert_eq!(
      console.cache.state(&EntityKey::list(EntityKind::Job)),
      EntryState::Fresh
    );
    console.jobs.list(ListScope::All).await.unwrap();
    assert_eq!(gateway.calls("GET /jobs"), 1);
  }

  #[tokio::test]
  async fn test_scoped_lists_use_their_own_keys() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on(
      "GET /states?countryId=us",
      json!([{"id": 1, "name": "Texas", "countryId": "us"}]),
    );
    gateway.on(
      "GET /jobs/9/applications",
      json!({
        "applications": [
          {"id": 1, "applicantName": "Ada", "email": "ada@example.com", "status": "PENDING"},
          {"id": 2, "applicantName": "Alan", "email": "alan@example.com", "status": "HIRED"}
        ],
        "total": 2
      }),
    );
    let console = console(&gateway);

    let states = console
      .states
      .list(ListScope::Country("us".into()))
      .await
      .unwrap();
    assert_eq!(states.items[0].country_id(), Some("us"));

    let applications = console
      .applications
      .list(ListScope::Job("9".into()))
      .await
      .unwrap();
    assert_eq!(applications.total, 2);
    assert_eq!(applications.items[1].status, ApplicationStatus::Hired);

    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::Application, "9")),
      EntryState::Fresh
    );
    assert_eq!(
      console.cache.state(&EntityKey::list(EntityKind::Application)),
      EntryState::Empty
    );
  }

  #[tokio::test]
  async fn test_application_status_change_leaves_jobs_alone() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on("GET /jobs", jobs_payload(None));
    gateway.on(
      "GET /jobs/9/applications",
      json!([{"id": 4, "applicantName": "Grace", "email": "g@example.com"}]),
    );
    gateway.on(
      "PATCH /applications/4/status",
      json!({"application": {"id": 4, "applicantName": "Grace", "email": "g@example.com", "status": "SHORTLISTED"}}),
    );
    let console = console(&gateway);

    console.jobs.list(ListScope::All).await.unwrap();
    console
      .applications
      .list(ListScope::Job("9".into()))
      .await
      .unwrap();

    let application = console
      .applications
      .set_status("4", &ApplicationStatus::Shortlisted)
      .await
      .unwrap();
    assert_eq!(application.status, ApplicationStatus::Shortlisted);

    assert_eq!(
      console.cache.state(&EntityKey::list(EntityKind::Job)),
      EntryState::Fresh
    );
    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::Application, "9")),
      EntryState::Stale
    );
  }

  #[tokio::test]
  async fn test_country_delete_stales_state_lists() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on("GET /states?countryId=cl", json!({"states": []}));
    gateway.on("DELETE /countries/cl", Value::Null);
    let console = console(&gateway);

    console
      .states
      .list(ListScope::Country("cl".into()))
      .await
      .unwrap();
    console.countries.delete("cl").await.unwrap();

    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::State, "cl")),
      EntryState::Stale
    );
  }

  #[tokio::test]
  async fn test_watched_list_follows_create() {
    let gateway = Arc::new(MockGateway::new());
    gateway
      .on("GET /countries", json!({"countries": [{"id": 1, "name": "Chile"}]}))
      .on(
        "GET /countries",
        json!({"countries": [{"id": 1, "name": "Chile"}, {"id": 2, "name": "Peru"}]}),
      );
    gateway.on("POST /countries", json!({"country": {"id": 2, "name": "Peru"}}));
    let console = console(&gateway);

    let mut countries = console.countries.watch_list(ListScope::All);
    while !countries.is_success() {
      assert!(countries.changed().await);
    }
    assert_eq!(countries.data().map(|l| l.total), Some(1));

    let created = console
      .countries
      .create(&NewCountry {
        name: "Peru".into(),
        iso_code: None,
        phone_code: None,
      })
      .await
      .unwrap();
    assert_eq!(created.id, "2");

    // Observed lists refetch without anyone reading them.
    while countries.data().map(|l| l.total) != Some(2) {
      assert!(countries.changed().await);
    }
    assert_eq!(gateway.calls("GET /countries"), 2);
  }

  #[tokio::test]
  async fn test_missing_entity_is_a_gateway_error() {
    let gateway = Arc::new(MockGateway::new());
    gateway.fail("GET /jobs/404", 404, "job not found");
    let console = console(&gateway);

    let err = console.jobs.get_by_id("404").await.unwrap_err();
    assert!(err.gateway().is_some_and(|e| e.is_not_found()));
    assert_eq!(
      console.cache.state(&EntityKey::item(EntityKind::Job, "404")),
      EntryState::Error
    );
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on_delayed(
      "GET /jobs/7",
      json!({"job": {"id": 7, "title": "Job 7"}}),
      Duration::from_millis(30),
    );
    let console = console(&gateway);

    let (a, b) = tokio::join!(console.jobs.get_by_id("7"), console.jobs.get_by_id("7"));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(gateway.calls("GET /jobs/7"), 1);
  }

  #[tokio::test]
  async fn test_job_delete_stales_only_its_application_lists() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on("GET /jobs/9/applications", json!([]));
    gateway.on("GET /jobs/10/applications", json!([]));
    gateway.on("DELETE /jobs/9", Value::Null);
    let console = console(&gateway);

    for job in ["9", "10"] {
      console
        .applications
        .list(ListScope::Job(job.into()))
        .await
        .unwrap();
    }
    console.jobs.delete("9").await.unwrap();

    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::Application, "9")),
      EntryState::Stale
    );
    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::Application, "10")),
      EntryState::Fresh
    );
  }

  #[tokio::test]
  async fn test_job_update_stales_applications_embedding_it() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on(
      "GET /jobs/9/applications",
      json!([{"id": 4, "applicantName": "Grace", "email": "g@example.com", "job": {"id": 9, "title": "Welder"}}]),
    );
    gateway.on("PUT /jobs/9", json!({"id": 9, "title": "Senior Welder"}));
    let console = console(&gateway);

    console
      .applications
      .list(ListScope::Job("9".into()))
      .await
      .unwrap();
    let job = console
      .jobs
      .update(
        "9",
        &JobUpdate {
          title: Some("Senior Welder".into()),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(job.title, "Senior Welder");

    assert_eq!(
      console
        .cache
        .state(&EntityKey::scoped_list(EntityKind::Application, "9")),
      EntryState::Stale
    );
  }

  #[tokio::test]
  async fn test_country_update_stales_states_embedding_it() {
    let gateway = Arc::new(MockGateway::new());
    gateway.on(
      "GET /states/1",
      json!({"id": 1, "name": "Ontario", "country": {"id": "ca", "name": "Canada"}}),
    );
    gateway.on("PUT /countries/ca", json!({"id": "ca", "name": "Kanada"}));
    let console = console(&gateway);

    console.states.get_by_id("1").await.unwrap();
    console
      .countries
      .update(
        "ca",
        &CountryUpdate {
          name: Some("Kanada".into()),
          ..Default::default()
        },
      )
      .await
      .unwrap();

    assert_eq!(
      console.cache.state(&EntityKey::item(EntityKind::State, "1")),
      EntryState::Stale
    );
  }
}

