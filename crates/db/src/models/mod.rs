//! Row structs and insert/update DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus the DTOs its repository accepts.

pub mod catalog;
pub mod device;
pub mod dispatch_lock;
pub mod preference;
pub mod send_log;
