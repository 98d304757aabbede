//! Provider wrapper used by the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use matchday_core::catalog::NotificationType;
use matchday_core::error::TemplateError;
use matchday_core::template::Template;
use matchday_core::types::EventParams;

use super::provider::{DeviceSendOutcome, GroupingMetadata, PushPayload, PushProvider};
use crate::event::EventContext;

/// Result of one delivery attempt for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The provider accepted the push for at least one device.
    Accepted { devices: Vec<DeviceSendOutcome> },
    /// Timeout, transport error, provider error, or every device rejected.
    Failed {
        detail: String,
        devices: Vec<DeviceSendOutcome>,
    },
}

impl DeliveryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

pub struct DeliveryAdapter {
    provider: Arc<dyn PushProvider>,
    timeout: Duration,
}

impl DeliveryAdapter {
    pub fn new(provider: Arc<dyn PushProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Send once, bounded by the configured timeout. No retry.
    pub async fn deliver(
        &self,
        device_ids: &[String],
        payload: &PushPayload,
        grouping: &GroupingMetadata,
    ) -> DeliveryOutcome {
        let call = self.provider.send(device_ids, payload, grouping);
        let devices = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                return DeliveryOutcome::Failed {
                    detail: format!("timeout after {}ms", self.timeout.as_millis()),
                    devices: Vec::new(),
                }
            }
            Ok(Err(e)) => {
                return DeliveryOutcome::Failed {
                    detail: e.to_string(),
                    devices: Vec::new(),
                }
            }
            Ok(Ok(devices)) => devices,
        };

        if devices.iter().any(|d| d.accepted) {
            return DeliveryOutcome::Accepted { devices };
        }

        let detail = if devices.is_empty() {
            "provider returned no device results".to_string()
        } else {
            devices
                .iter()
                .map(|d| {
                    format!(
                        "{}: {}",
                        d.device_id,
                        d.error.as_deref().unwrap_or("rejected")
                    )
                })
                .collect::<Vec<_>>()
                .join("; ")
        };
        DeliveryOutcome::Failed { detail, devices }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_optional(
    template: Option<&Template>,
    params: &EventParams,
) -> Result<Option<String>, TemplateError> {
    template.map(|t| t.render(params)).transpose()
}

/// Render the type's grouping identifiers from event parameters.
pub fn render_grouping(
    ntype: &NotificationType,
    params: &EventParams,
) -> Result<GroupingMetadata, TemplateError> {
    let grouping = &ntype.grouping;
    Ok(GroupingMetadata {
        collapse_id: render_optional(grouping.collapse_id_format.as_ref(), params)?,
        thread_id: render_optional(grouping.thread_id_format.as_ref(), params)?,
        platform_group: render_optional(grouping.platform_group_format.as_ref(), params)?,
    })
}

/// Build the push payload, rendering the deep link if the type has one.
pub fn render_payload(
    ntype: &NotificationType,
    event: &EventContext,
) -> Result<PushPayload, TemplateError> {
    let url = render_optional(
        ntype.deep_links.as_ref().map(|d| &d.url_format),
        &event.params,
    )?;
    Ok(PushPayload {
        title: event.content.title.clone(),
        body: event.content.body.clone(),
        data: event.content.data.clone(),
        url,
    })
}
