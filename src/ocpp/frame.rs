//! OCPP-J wire framing
//!
//! OCPP 1.6J messages are JSON arrays whose first element is a small integer
//! tag: `[2, id, action, payload]` for a CALL, `[3, id, payload]` for a
//! CALLRESULT and `[4, id, code, description, details]` for a CALLERROR.
//! Payloads stay as raw `serde_json::Value`; upper layers parse them lazily.

use crate::error::{AmpereError, Result};
use serde_json::{Value, json};

const MESSAGE_TYPE_CALL: u64 = 2;
const MESSAGE_TYPE_CALL_RESULT: u64 = 3;
const MESSAGE_TYPE_CALL_ERROR: u64 = 4;

/// A decoded OCPP-J frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Request initiated by the peer
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    /// Response to a CALL
    CallResult { message_id: String, payload: Value },
    /// Error response to a CALL
    CallError {
        message_id: String,
        code: String,
        description: String,
        details: Value,
    },
}

impl Frame {
    /// Decode a text frame into a typed variant
    pub fn decode(text: &str) -> Result<Frame> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| AmpereError::frame(format!("Invalid JSON frame: {}", e)))?;
        let elements = value
            .as_array()
            .ok_or_else(|| AmpereError::frame("Frame is not a JSON array"))?;

        let tag = elements
            .first()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| AmpereError::frame("Missing message type tag"))?;
        let message_id = elements
            .get(1)
            .and_then(|v| v.as_str())
            .ok_or_else(|| AmpereError::frame("Missing message id"))?
            .to_string();

        match tag {
            MESSAGE_TYPE_CALL => {
                let action = elements
                    .get(2)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| AmpereError::frame("CALL without action"))?
                    .to_string();
                let payload = elements.get(3).cloned().unwrap_or_else(|| json!({}));
                Ok(Frame::Call {
                    message_id,
                    action,
                    payload,
                })
            }
            MESSAGE_TYPE_CALL_RESULT => {
                let payload = elements.get(2).cloned().unwrap_or_else(|| json!({}));
                Ok(Frame::CallResult {
                    message_id,
                    payload,
                })
            }
            MESSAGE_TYPE_CALL_ERROR => Ok(Frame::CallError {
                message_id,
                code: elements
                    .get(2)
                    .and_then(|v| v.as_str())
                    .unwrap_or("GenericError")
                    .to_string(),
                description: elements
                    .get(3)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                details: elements.get(4).cloned().unwrap_or_else(|| json!({})),
            }),
            other => Err(AmpereError::frame(format!(
                "Unknown message type tag: {}",
                other
            ))),
        }
    }

    /// Encode back to the wire representation
    pub fn encode(&self) -> String {
        let value = match self {
            Frame::Call {
                message_id,
                action,
                payload,
            } => json!([MESSAGE_TYPE_CALL, message_id, action, payload]),
            Frame::CallResult {
                message_id,
                payload,
            } => json!([MESSAGE_TYPE_CALL_RESULT, message_id, payload]),
            Frame::CallError {
                message_id,
                code,
                description,
                details,
            } => json!([
                MESSAGE_TYPE_CALL_ERROR,
                message_id,
                code,
                description,
                details
            ]),
        };
        value.to_string()
    }

    /// Build a CALLRESULT reply for a received CALL
    pub fn result(message_id: impl Into<String>, payload: Value) -> Frame {
        Frame::CallResult {
            message_id: message_id.into(),
            payload,
        }
    }

    /// Build a CALL we originate; the message id is the current millisecond
    /// timestamp, unique per connection because outbound sends are serialized.
    pub fn call(action: impl Into<String>, payload: Value) -> Frame {
        Frame::Call {
            message_id: millis_message_id(),
            action: action.into(),
            payload,
        }
    }

    /// Message id shared by all three variants
    pub fn message_id(&self) -> &str {
        match self {
            Frame::Call { message_id, .. }
            | Frame::CallResult { message_id, .. }
            | Frame::CallError { message_id, .. } => message_id,
        }
    }
}

/// Millisecond-timestamp message id for originated calls
pub fn millis_message_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_call() {
        let frame = Frame::decode(r#"[2,"m1","Heartbeat",{}]"#).unwrap();
        match frame {
            Frame::Call {
                message_id,
                action,
                payload,
            } => {
                assert_eq!(message_id, "m1");
                assert_eq!(action, "Heartbeat");
                assert_eq!(payload, json!({}));
            }
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn decode_call_without_payload_defaults_to_empty() {
        let frame = Frame::decode(r#"[2,"m2","Heartbeat"]"#).unwrap();
        match frame {
            Frame::Call { payload, .. } => assert_eq!(payload, json!({})),
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn decode_call_result_and_error() {
        let result = Frame::decode(r#"[3,"m1",{"currentTime":"t"}]"#).unwrap();
        assert!(matches!(result, Frame::CallResult { .. }));
        assert_eq!(result.message_id(), "m1");

        let error = Frame::decode(r#"[4,"m1","NotSupported","nope",{}]"#).unwrap();
        match error {
            Frame::CallError { code, .. } => assert_eq!(code, "NotSupported"),
            other => panic!("expected CallError, got {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_malformed_frames() {
        assert!(Frame::decode("not json").is_err());
        assert!(Frame::decode(r#"{"action":"Heartbeat"}"#).is_err());
        assert!(Frame::decode(r#"[9,"m1","Heartbeat",{}]"#).is_err());
        assert!(Frame::decode(r#"[2]"#).is_err());
        assert!(Frame::decode(r#"[2,42,"Heartbeat",{}]"#).is_err());
        assert!(Frame::decode(r#"[2,"m1"]"#).is_err());
    }

    #[test]
    fn encode_round_trips() {
        let frame = Frame::result("m7", json!({"status":"Accepted"}));
        let encoded = frame.encode();
        assert_eq!(Frame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn originated_call_carries_numeric_message_id() {
        let frame = Frame::call("RemoteStopTransaction", json!({"transactionId": 5}));
        assert!(frame.message_id().parse::<i64>().is_ok());
    }
}
