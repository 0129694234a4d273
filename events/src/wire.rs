//! JSON shapes exchanged with the relay. Both transports carry the same text.

use crate::kind::{Category, UpdateKind};
use crate::page::Page;
use crate::OriginId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Trait for getting the name a message is sent under on the push stream.
pub trait EventType {
    fn event_type(&self) -> String;
}

/// The wire form of an [`crate::Update`].
///
/// Older clients send `userId`, `timestamp` and `page`; those names are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUpdate {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(alias = "userId")]
    pub origin_id: OriginId,
    #[serde(alias = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub emitted_at: DateTime<Utc>,
    #[serde(
        default,
        rename = "page",
        alias = "scopePage",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope_page: Option<Page>,
    #[serde(default)]
    pub data: Value,
}

impl WireUpdate {
    /// The kind with the separate `category` field folded in where the type alone has none.
    pub fn resolved_kind(&self) -> UpdateKind {
        match (self.kind, self.category) {
            (UpdateKind::CacheInvalidate(None), Some(category)) => {
                UpdateKind::CacheInvalidate(Some(category))
            }
            (kind, _) => kind,
        }
    }
}

impl EventType for WireUpdate {
    fn event_type(&self) -> String {
        self.kind.wire_name()
    }
}

/// Server-originated messages that are not updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// Greeting sent right after a client connects.
    #[serde(rename = "connected")]
    Connected {
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
        #[serde(default)]
        connected_clients: usize,
    },
    /// Liveness ping. Clients send these too, with their `userId`.
    #[serde(rename = "heartbeat")]
    Heartbeat {
        #[serde(default, alias = "originId")]
        user_id: Option<String>,
        #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
        #[serde(default)]
        connected_clients: usize,
    },
    /// Ask clients on `page` (or every page when absent or `all`) to reload their data.
    #[serde(rename = "force-refresh")]
    ForceRefresh {
        #[serde(default)]
        page: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default = "Utc::now", with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
}

impl ControlMessage {
    /// Whether a force-refresh targets `page`. Other control messages target nobody.
    pub fn refreshes(&self, page: Page) -> bool {
        match self {
            ControlMessage::ForceRefresh { page: target, .. } => match target.as_deref() {
                None | Some("all") => true,
                Some(target) => Page::from(target) == page,
            },
            _ => false,
        }
    }
}

impl EventType for ControlMessage {
    fn event_type(&self) -> String {
        match self {
            ControlMessage::Connected { .. } => "connection",
            ControlMessage::Heartbeat { .. } => "heartbeat",
            ControlMessage::ForceRefresh { .. } => "force-refresh",
        }
        .to_string()
    }
}

/// Anything a client can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Update(WireUpdate),
    Control(ControlMessage),
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    MissingType,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid message: {e}"),
            DecodeError::MissingType => write!(f, "message has no type"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            DecodeError::MissingType => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

/// Decodes one text frame. Heartbeats decode as control messages whoever sent them.
pub fn decode_inbound(raw: &str) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let message_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    match message_type {
        "connected" | "heartbeat" | "force-refresh" => {
            Ok(Inbound::Control(serde_json::from_value(value)?))
        }
        _ => Ok(Inbound::Update(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_legacy_field_names() {
        let raw = json!({
            "type": "event-created",
            "userId": "user_1_abc",
            "timestamp": 1_700_000_000_000i64,
            "page": "events",
            "data": { "eventName": "Sports Day" }
        })
        .to_string();

        let Inbound::Update(update) = decode_inbound(&raw).unwrap() else {
            panic!("expected an update");
        };
        assert_eq!(update.kind, UpdateKind::EntityCreated(Category::Event));
        assert_eq!(update.origin_id.as_str(), "user_1_abc");
        assert_eq!(update.emitted_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(update.scope_page, Some(Page::Events));
    }

    #[test]
    fn encodes_camel_case_names() {
        let update = WireUpdate {
            kind: UpdateKind::EntityDeleted(Category::Prefect),
            category: Some(Category::Prefect),
            origin_id: OriginId::new("user_2_xyz").unwrap(),
            emitted_at: DateTime::from_timestamp_millis(5).unwrap(),
            scope_page: None,
            data: json!({ "prefectId": "p1" }),
        };

        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "prefect-deleted");
        assert_eq!(value["category"], "prefect");
        assert_eq!(value["originId"], "user_2_xyz");
        assert_eq!(value["emittedAt"], 5);
        assert!(value.get("page").is_none());
    }

    #[test]
    fn cache_invalidate_takes_category_field() {
        let raw =
            r#"{"type":"cache-invalidate","category":"event","originId":"srv","emittedAt":1}"#;
        let Inbound::Update(update) = decode_inbound(raw).unwrap() else {
            panic!("expected an update");
        };
        assert_eq!(
            update.resolved_kind(),
            UpdateKind::CacheInvalidate(Some(Category::Event))
        );
    }

    #[test]
    fn server_heartbeat_without_origin_is_control() {
        let raw = r#"{"type":"heartbeat","timestamp":10,"connectedClients":3}"#;
        assert!(matches!(
            decode_inbound(raw).unwrap(),
            Inbound::Control(ControlMessage::Heartbeat {
                connected_clients: 3,
                ..
            })
        ));
    }

    #[test]
    fn force_refresh_scoping() {
        let all = ControlMessage::ForceRefresh {
            page: Some("all".into()),
            message: None,
            timestamp: Utc::now(),
        };
        let events_only = ControlMessage::ForceRefresh {
            page: Some("events".into()),
            message: None,
            timestamp: Utc::now(),
        };
        assert!(all.refreshes(Page::Cetus));
        assert!(events_only.refreshes(Page::Events));
        assert!(!events_only.refreshes(Page::Dashboard));
    }

    #[test]
    fn rejects_frames_without_type_or_origin() {
        assert!(matches!(
            decode_inbound(r#"{"userId":"a"}"#),
            Err(DecodeError::MissingType)
        ));
        assert!(decode_inbound(r#"{"type":"prefect-created","emittedAt":1}"#).is_err());
        assert!(
            decode_inbound(r#"{"type":"prefect-created","originId":"","emittedAt":1}"#).is_err()
        );
        assert!(decode_inbound("not json").is_err());
    }
}
