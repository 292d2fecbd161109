//! Relay wire messages (NIP-01)
//!
//! Client to relay: REQ, CLOSE. Relay to client: EVENT, EOSE, CLOSED,
//! NOTICE, OK. Only what the gateway reads and writes is modeled.

use super::event::{Event, Filter};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Well-formed EVENT frame whose payload is not a valid event
    #[error("invalid event payload: {0}")]
    InvalidEvent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Messages sent from client to relay
#[derive(Debug, Clone)]
pub enum ClientMessage {
    /// ["REQ", <subscription_id>, <filter>...]
    Req {
        subscription_id: String,
        filters: Vec<Filter>,
    },

    /// ["CLOSE", <subscription_id>]
    Close { subscription_id: String },
}

impl ClientMessage {
    pub fn req(subscription_id: impl Into<String>, filter: Filter) -> Self {
        ClientMessage::Req {
            subscription_id: subscription_id.into(),
            filters: vec![filter],
        }
    }

    pub fn close(subscription_id: impl Into<String>) -> Self {
        ClientMessage::Close {
            subscription_id: subscription_id.into(),
        }
    }

    /// Serialize to the JSON array sent over the socket
    pub fn to_json(&self) -> Result<String, MessageError> {
        let value = match self {
            ClientMessage::Req {
                subscription_id,
                filters,
            } => {
                let mut arr = vec![
                    Value::String("REQ".to_string()),
                    Value::String(subscription_id.clone()),
                ];
                for filter in filters {
                    arr.push(serde_json::to_value(filter)?);
                }
                Value::Array(arr)
            }
            ClientMessage::Close { subscription_id } => {
                serde_json::json!(["CLOSE", subscription_id])
            }
        };
        Ok(value.to_string())
    }
}

/// Messages sent from relay to client
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        event: Event,
    },
    Eose {
        subscription_id: String,
    },
    Closed {
        subscription_id: String,
        message: String,
    },
    Notice {
        message: String,
    },
    Ok {
        event_id: String,
        accepted: bool,
        message: String,
    },
}

impl RelayMessage {
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        let arr: Vec<Value> = serde_json::from_str(json)?;
        let msg_type = arr
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| MessageError::InvalidFormat("first element not a string".into()))?;

        match msg_type {
            "EVENT" => {
                let subscription_id = string_at(&arr, 1, "subscription_id")?;
                let raw = arr
                    .get(2)
                    .cloned()
                    .ok_or_else(|| MessageError::InvalidFormat("missing event".into()))?;
                let event: Event =
                    serde_json::from_value(raw).map_err(|e| MessageError::InvalidEvent(e.to_string()))?;
                Ok(RelayMessage::Event { subscription_id, event })
            }
            "EOSE" => Ok(RelayMessage::Eose {
                subscription_id: string_at(&arr, 1, "subscription_id")?,
            }),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: string_at(&arr, 1, "subscription_id")?,
                message: optional_string_at(&arr, 2),
            }),
            "NOTICE" => Ok(RelayMessage::Notice {
                message: string_at(&arr, 1, "message")?,
            }),
            "OK" => Ok(RelayMessage::Ok {
                event_id: string_at(&arr, 1, "event_id")?,
                accepted: arr.get(2).and_then(Value::as_bool).ok_or_else(|| {
                    MessageError::InvalidFormat("accepted flag not a boolean".into())
                })?,
                message: optional_string_at(&arr, 3),
            }),
            other => Err(MessageError::UnknownType(other.to_string())),
        }
    }

    /// Subscription this message belongs to, if any
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            RelayMessage::Event { subscription_id, .. }
            | RelayMessage::Eose { subscription_id }
            | RelayMessage::Closed { subscription_id, .. } => Some(subscription_id),
            RelayMessage::Notice { .. } | RelayMessage::Ok { .. } => None,
        }
    }
}

fn string_at(arr: &[Value], index: usize, field: &str) -> Result<String, MessageError> {
    arr.get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MessageError::InvalidFormat(format!("{} missing or not a string", field)))
}

fn optional_string_at(arr: &[Value], index: usize) -> String {
    arr.get(index).and_then(Value::as_str).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_req_serialization() {
        let msg = ClientMessage::req("sub1", Filter::new().kind(3).limit(1));
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json[0], "REQ");
        assert_eq!(json[1], "sub1");
        assert_eq!(json[2]["kinds"], serde_json::json!([3]));
        assert_eq!(json[2]["limit"], 1);

        let close = ClientMessage::close("sub1").to_json().unwrap();
        assert_eq!(close, r#"["CLOSE","sub1"]"#);
    }

    #[test]
    fn test_parse_event() {
        let raw = r#"["EVENT","sub1",{"id":"abc","pubkey":"00","created_at":5,"kind":3,"tags":[["p","ff"]],"content":"","sig":"s"}]"#;
        match RelayMessage::from_json(raw).unwrap() {
            RelayMessage::Event { subscription_id, event } => {
                assert_eq!(subscription_id, "sub1");
                assert_eq!(event.kind, 3);
                assert_eq!(event.created_at, 5);
                assert_eq!(event.tags, vec![vec!["p".to_string(), "ff".to_string()]]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_messages() {
        assert_eq!(
            RelayMessage::from_json(r#"["EOSE","sub1"]"#).unwrap(),
            RelayMessage::Eose { subscription_id: "sub1".into() }
        );
        assert_eq!(
            RelayMessage::from_json(r#"["CLOSED","sub1","rate-limited: slow down"]"#).unwrap(),
            RelayMessage::Closed {
                subscription_id: "sub1".into(),
                message: "rate-limited: slow down".into(),
            }
        );
        let notice = RelayMessage::from_json(r#"["NOTICE","hello"]"#).unwrap();
        assert_eq!(notice.subscription_id(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RelayMessage::from_json("not json").is_err());
        assert!(RelayMessage::from_json("[]").is_err());
        assert!(matches!(
            RelayMessage::from_json(r#"["AUTH","challenge"]"#),
            Err(MessageError::UnknownType(_))
        ));
        assert!(RelayMessage::from_json(r#"["EVENT","sub1"]"#).is_err());
    }

    #[test]
    fn test_bad_event_payload_is_invalid_event() {
        let raw = r#"["EVENT","sub1",{"id":"abc","kind":"three"}]"#;
        assert!(matches!(RelayMessage::from_json(raw), Err(MessageError::InvalidEvent(_))));
    }
}
