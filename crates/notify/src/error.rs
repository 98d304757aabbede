//! Dispatch errors.
//!
//! Everything here aborts a dispatch. Per-candidate problems (a provider
//! failure, a store error while filtering one user) are recorded as `failed`
//! rows in the send log instead and never surface as a [`DispatchError`].

use matchday_core::error::{CatalogError, TemplateError};

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Unknown notification key. Raised before any ledger write.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A catalog template references a parameter the event did not supply.
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Invalid event parameter {name}: {value:?}")]
    InvalidParameter { name: String, value: String },

    #[error("Notification type {0} excludes the sender but the event has no actor")]
    MissingActor(String),

    /// Audience resolution or the global lock could not reach the store.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Whether the failure happened before anything could have been written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Catalog(_)
                | Self::Template(_)
                | Self::InvalidParameter { .. }
                | Self::MissingActor(_)
        )
    }
}
