use events::EventType;
use serde::Serialize;

/// One outbound message, independent of the transport that will carry it.
///
/// The web layer renders it as an SSE event named `event_type`, or as a socket text
/// message carrying `data` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub event_type: String,
    pub data: String,
}

impl OutboundFrame {
    pub fn from_event<T>(event: &T) -> Result<Self, serde_json::Error>
    where
        T: EventType + Serialize,
    {
        Ok(Self {
            event_type: event.event_type(),
            data: serde_json::to_string(event)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use events::ControlMessage;

    #[test]
    fn control_frames_use_their_event_name() {
        let frame = OutboundFrame::from_event(&ControlMessage::Connected {
            user_id: Some("user_1".into()),
            timestamp: Utc::now(),
            connected_clients: 4,
        })
        .unwrap();

        assert_eq!(frame.event_type, "connection");
        let value: serde_json::Value = serde_json::from_str(&frame.data).unwrap();
        assert_eq!(value["type"], "connected");
        assert_eq!(value["connectedClients"], 4);
    }
}
