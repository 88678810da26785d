//! Declarative resource registry with batched relationship resolution.
//!
//! A backend declares **resources** (entities exposed through an API)
//! together with their **verbs** (read/create/update/delete/custom
//! operations), **relationships** to other resources and **capabilities**
//! (which protocols expose them). From those declarations the engine
//! derives queryable API surfaces:
//!
//! - [`resolver`] groups heterogeneous-cardinality relationship requests
//!   and resolves them without one-query-per-row fan-out: one repository
//!   read per (relationship, target resource) per request.
//! - [`context`] normalizes raw client parameters into a per-request
//!   pagination/sort/filter context, deciding the offset-vs-cursor strategy
//!   and partitioning filter conditions into store-pushable vs in-memory.
//! - [`applier`] re-applies the in-memory conditions to fetched pages and
//!   keeps their pagination metadata truthful.
//! - [`typemap`] maps declarative schema properties into typed
//!   argument/field definitions, caching generated composites by canonical
//!   name so recursively-nested shapes never duplicate.
//!
//! The engine is storage- and transport-agnostic: storage plugs in through
//! the [`repository::Repository`] trait, and a query-execution layer (a
//! GraphQL or REST handler) consumes
//! [`resolver::resolve_relationship`], [`context::build_context`], the
//! [`typemap::TypeResolver`] and the cursor codec in [`pagination`]. The
//! resource/schema/relationship graph is built once at startup via
//! [`registry::Registry::new`] and read-only afterwards.

pub mod applier;
pub mod config;
pub mod context;
pub mod error;
mod inflect;
pub mod pagination;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod serializer;
pub mod typemap;

pub use config::EngineConfig;
pub use error::{Error, RepositoryError};

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for host binaries and tests. Safe to call more than
/// once; only the first call installs the subscriber.
pub fn init_tracing() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
