//! Client library for the hydra service registry
//!
//! Hydra services share one Redis instance as their registry: every instance
//! heartbeats into a nodes hash, publishes its API routes, writes health
//! snapshots and logs, and reads versioned configuration. This crate is the
//! operator side of that layout.
//!
//! # Architecture
//!
//! - [`profile`] keeps named connection profiles in a local state file
//! - [`connection`] opens a bounded-time connection using a profile
//! - [`backend`] abstracts the store (Redis, or in-memory for tests)
//! - [`engine`] runs queries and mutations over an open connection
//! - [`messaging`] builds envelopes and hands them to a transport
//!
//! # Example
//!
//! ```no_run
//! use hydra_registry::{NodeFilter, ProfileStore, Registry, RegistryConnection, Settings};
//!
//! # async fn example() -> hydra_registry::Result<()> {
//! let settings = Settings::default();
//! let store = ProfileStore::new(ProfileStore::default_path());
//! let state = store.load().await.ok_or(hydra_registry::Error::ConfigAbsent)?;
//! let profile = state.active_profile().ok_or(hydra_registry::Error::ConfigAbsent)?;
//!
//! let conn = RegistryConnection::open(profile, settings.connect_timeout).await?;
//! let mut registry = Registry::new(conn, settings);
//! for node in registry.list_nodes(&NodeFilter::all()).await? {
//!     println!("{} {} {:?}", node.service_name, node.instance_id, node.elapsed);
//! }
//! registry.close().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod connection;
pub mod engine;
pub mod error;
pub mod messaging;
pub mod models;
pub mod profile;
pub mod settings;

pub use backend::{MemoryBackend, RedisBackend, RegistryBackend};
pub use connection::{ConnectionState, RegistryConnection};
pub use engine::{NodeFilter, Registry, check_rest_args};
pub use error::{Error, Result};
pub use messaging::{Envelope, MessageTransport, RawResponse, RestResponse, RouteSpec};
pub use models::*;
pub use profile::{Profile, ProfileState, ProfileStore};
pub use settings::Settings;
