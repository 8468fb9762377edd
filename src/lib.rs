//! Entity synchronization core for the job-board admin console.
//!
//! Server-owned entities (jobs, states, countries, applications) are read
//! through a shared [`cache::QueryCache`] and written through a
//! [`mutation::MutationCoordinator`] that invalidates what each write touched.
//! [`repository::Console`] bundles both per entity family.

pub mod cache;
pub mod config;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod mutation;
pub mod normalize;
pub mod query;
pub mod repository;

pub use repository::{Console, Repository};
