//! Shared data model for prefect-admin live updates.
//!
//! This crate has no dependencies on the other workspace crates so that both the
//! client core (`realtime`) and the relay (`sse`, `web`) can speak the same types.
//!
//! # Architecture
//!
//! - **Update**: one change notification, routed by its [`UpdateKind`]
//! - **UpdateKind / Category**: closed set of kinds, each scoped to an entity category
//! - **Page**: the view a client is showing, used for relevance decisions
//! - **wire**: JSON encoding shared by the push stream, the socket and the broadcast endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub mod kind;
pub mod page;
pub mod wire;

pub use kind::{Category, UpdateKind};
pub use page::Page;
pub use wire::{decode_inbound, ControlMessage, DecodeError, EventType, Inbound, WireUpdate};

/// Identifies the client session that produced an update. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginId(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyOriginId;

impl fmt::Display for EmptyOriginId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("origin id must not be empty")
    }
}

impl std::error::Error for EmptyOriginId {}

impl OriginId {
    pub fn new(id: impl Into<String>) -> Result<Self, EmptyOriginId> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EmptyOriginId);
        }
        Ok(Self(id))
    }

    /// A fresh session id of the form `user_<millis>_<9 chars>`.
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "user_{}_{}",
            Utc::now().timestamp_millis(),
            &suffix[..9]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OriginId {
    type Error = EmptyOriginId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OriginId::new(value)
    }
}

impl From<OriginId> for String {
    fn from(id: OriginId) -> Self {
        id.0
    }
}

/// A single change notification.
///
/// `emitted_at` orders updates within one connection; `received_at` is local wall-clock
/// time and is only used for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub kind: UpdateKind,
    pub origin_id: OriginId,
    pub emitted_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// Variant-specific data. Opaque beyond [`Update::label`] and [`Update::house`].
    pub payload: Value,
    pub scope_page: Option<Page>,
}

impl Update {
    /// A locally originated update stamped with the current time.
    pub fn new(kind: UpdateKind, origin_id: OriginId, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            kind,
            origin_id,
            emitted_at: now,
            received_at: now,
            payload,
            scope_page: None,
        }
    }

    pub fn with_scope_page(mut self, page: Page) -> Self {
        self.scope_page = Some(page);
        self
    }

    pub fn category(&self) -> Option<Category> {
        self.kind.category()
    }

    pub fn from_wire(wire: WireUpdate, received_at: DateTime<Utc>) -> Self {
        Self {
            kind: wire.resolved_kind(),
            origin_id: wire.origin_id,
            emitted_at: wire.emitted_at,
            received_at,
            payload: wire.data,
            scope_page: wire.scope_page,
        }
    }

    pub fn to_wire(&self) -> WireUpdate {
        WireUpdate {
            kind: self.kind,
            category: self.kind.category(),
            origin_id: self.origin_id.clone(),
            emitted_at: self.emitted_at,
            scope_page: self.scope_page,
            data: self.payload.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_wire())
    }

    /// A human-readable name for the changed entity, if the payload carries one.
    pub fn label(&self) -> Option<&str> {
        const KEYS: [&str; 4] = ["label", "FullName", "fullName", "eventName"];
        fn lookup(value: &Value) -> Option<&str> {
            KEYS.iter()
                .find_map(move |key| value.get(*key).and_then(Value::as_str))
        }
        lookup(&self.payload).or_else(|| self.payload.get("data").and_then(lookup))
    }

    /// The house the changed prefect belongs to, if the payload says.
    pub fn house(&self) -> Option<&str> {
        self.payload.get("house").and_then(Value::as_str)
    }
}

impl EventType for Update {
    fn event_type(&self) -> String {
        self.kind.wire_name()
    }
}
