//! Matchday push-notification dispatch and targeting engine.
//!
//! Building blocks, leaf-first:
//!
//! - [`store`]: async seams over the ledger, preference store, device
//!   registry and audience directory, with Postgres ([`postgres`]) and
//!   in-process ([`memory`]) implementations.
//! - [`audience`]: expands an event into candidate recipients.
//! - [`filter`]: the per-candidate suppression pipeline.
//! - [`delivery`]: the push provider contract and the delivery adapter.
//! - [`dispatcher`]: ties the above together for one domain event.
//! - [`reconcile`]: the scheduled device reconciliation job.
//! - [`devices`] / [`preferences`]: registration and preference seeding.

pub mod audience;
pub mod config;
pub mod delivery;
pub mod devices;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod filter;
pub mod memory;
pub mod postgres;
pub mod preferences;
pub mod reconcile;
pub mod store;

pub use config::EngineConfig;
pub use delivery::{DeliveryAdapter, HttpPushProvider, PushProvider};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::DispatchError;
pub use event::{EventContext, NotificationContent};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use reconcile::{ReconcileReport, ReconcileScheduler, ReconciliationJob};
pub use store::Stores;
