//! Telemetry events: payload construction, in-memory batching, and batched dispatch.
pub mod batcher;
pub mod dispatcher;

use std::collections::HashMap;

use chrono::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::session::SdkSession;
use crate::Value;

/// A telemetry event waiting to be dispatched.
///
/// Pending events are purely in-memory: events are lost on a crash before a flush, and a
/// flushed batch is not retried on failure. Delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingEvent {
    /// Kind of event (`offerImpression`, `offerPurchase`, custom types, ...).
    pub event_type: String,
    /// Random 128-bit identifier, unique per event.
    pub event_id: String,
    /// When the event was produced, as an ISO-8601 timestamp in UTC.
    pub event_time: String,
    /// User the event belongs to.
    pub user_id: String,
    /// Application the event belongs to.
    pub app_id: String,
    /// Version of the SDK that produced the event.
    pub sdk_version: String,
    /// Event-specific fields: offer attribution, custom payload, and so on.
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl PendingEvent {
    /// Build an event stamped with the session identity and the given production time.
    pub fn new(
        session: &SdkSession,
        event_type: impl Into<String>,
        event_time_epoch_seconds: i64,
        fields: HashMap<String, Value>,
    ) -> PendingEvent {
        PendingEvent {
            event_type: event_type.into(),
            event_id: format!("{:032x}", rand::thread_rng().gen::<u128>()),
            event_time: DateTime::from_timestamp(event_time_epoch_seconds, 0)
                .unwrap_or_default()
                .to_rfc3339(),
            user_id: session.user_id().to_owned(),
            app_id: session.app_id().to_owned(),
            sdk_version: session.sdk_metadata().version.to_owned(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::PendingEvent;
    use crate::session::{DeviceInfo, SdkSession};
    use crate::SdkMetadata;

    fn session() -> SdkSession {
        SdkSession::new(
            "key",
            "app",
            "user",
            "https://api.example.com",
            SdkMetadata {
                name: "rust",
                version: "1.2.3",
            },
            DeviceInfo::default(),
            HashMap::new(),
        )
    }

    #[test]
    fn event_is_stamped_with_session_identity() {
        let event = PendingEvent::new(&session(), "offerImpression", 1_700_000_000, HashMap::new());

        assert_eq!(event.event_type, "offerImpression");
        assert_eq!(event.user_id, "user");
        assert_eq!(event.app_id, "app");
        assert_eq!(event.sdk_version, "1.2.3");
        assert_eq!(event.event_time, "2023-11-14T22:13:20+00:00");
        assert_eq!(event.event_id.len(), 32);
    }

    #[test]
    fn custom_fields_flatten_into_the_payload() {
        let event = PendingEvent::new(
            &session(),
            "custom",
            0,
            [("level".to_owned(), 3.0.into())].into_iter().collect(),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "custom");
        assert_eq!(json["level"], 3.0);
    }

    #[test]
    fn event_ids_are_unique() {
        let session = session();
        let a = PendingEvent::new(&session, "t", 0, HashMap::new());
        let b = PendingEvent::new(&session, "t", 0, HashMap::new());

        assert_ne!(a.event_id, b.event_id);
    }
}
