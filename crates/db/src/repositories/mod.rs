//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod audience_repo;
pub mod catalog_repo;
pub mod device_registration_repo;
pub mod dispatch_lock_repo;
pub mod send_log_repo;
pub mod user_preference_repo;

pub use audience_repo::AudienceRepo;
pub use catalog_repo::CatalogRepo;
pub use device_registration_repo::DeviceRegistrationRepo;
pub use dispatch_lock_repo::DispatchLockRepo;
pub use send_log_repo::SendLogRepo;
pub use user_preference_repo::UserPreferenceRepo;
