//! Matchday notification domain logic.
//!
//! Zero I/O: catalog schema and loading, template rendering, the send-result
//! taxonomy, device eligibility and the pure suppression predicates. Shared by
//! the repository layer, the dispatch engine and the worker binary.

pub mod catalog;
pub mod device;
pub mod error;
pub mod send_result;
pub mod suppression;
pub mod template;
pub mod types;
