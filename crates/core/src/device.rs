//! Device subscription state and delivery eligibility.

use serde::{Deserialize, Serialize};

/// Provider-side subscription state of a device.
///
/// A freshly registered device has a token but the provider has not yet
/// reported an explicit subscribe or unsubscribe; that is `Pending`, which is
/// stored as `NULL` in `device_registrations.subscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
    Pending,
}

impl SubscriptionState {
    pub fn from_column(subscribed: Option<bool>) -> Self {
        match subscribed {
            Some(true) => Self::Subscribed,
            Some(false) => Self::Unsubscribed,
            None => Self::Pending,
        }
    }

    pub fn to_column(self) -> Option<bool> {
        match self {
            Self::Subscribed => Some(true),
            Self::Unsubscribed => Some(false),
            Self::Pending => None,
        }
    }
}

/// The subset of a device registration that decides deliverability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub is_active: bool,
    pub invalid: bool,
    pub subscription: SubscriptionState,
}

impl DeviceStatus {
    /// Whether a push may be sent to this device.
    ///
    /// Pending devices are tentatively eligible: a brand-new install gets its
    /// first notification rather than being dropped while the provider
    /// confirms the subscription.
    pub fn is_deliverable(&self) -> bool {
        self.is_active && !self.invalid && self.subscription != SubscriptionState::Unsubscribed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(is_active: bool, invalid: bool, subscription: SubscriptionState) -> DeviceStatus {
        DeviceStatus {
            is_active,
            invalid,
            subscription,
        }
    }

    #[test]
    fn column_mapping_is_tri_state() {
        for state in [
            SubscriptionState::Subscribed,
            SubscriptionState::Unsubscribed,
            SubscriptionState::Pending,
        ] {
            assert_eq!(SubscriptionState::from_column(state.to_column()), state);
        }
        assert_eq!(SubscriptionState::Pending.to_column(), None);
    }

    #[test]
    fn subscribed_active_device_is_deliverable() {
        assert!(status(true, false, SubscriptionState::Subscribed).is_deliverable());
    }

    #[test]
    fn pending_device_is_tentatively_deliverable() {
        assert!(status(true, false, SubscriptionState::Pending).is_deliverable());
    }

    #[test]
    fn unsubscribed_device_is_not_deliverable() {
        assert!(!status(true, false, SubscriptionState::Unsubscribed).is_deliverable());
    }

    #[test]
    fn invalid_or_inactive_device_is_not_deliverable() {
        assert!(!status(true, true, SubscriptionState::Subscribed).is_deliverable());
        assert!(!status(false, false, SubscriptionState::Subscribed).is_deliverable());
        assert!(!status(true, true, SubscriptionState::Pending).is_deliverable());
    }
}
