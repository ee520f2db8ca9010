//! JSON wire codec for bus envelopes.
//!
//! The codec classifies malformed envelopes precisely: an unknown message
//! type is a `ProtocolError`, an empty action or message id is a
//! `FormatViolation`. Payload bytes are forwarded untouched; interpreting
//! them is the validator's job.

use serde_json::Value;
use voltflow_ocpp::error::{ErrorCode, OcppError};
use voltflow_ocpp::message::{Message, MessageType};

pub fn decode(payload: &[u8]) -> Result<Message, OcppError> {
    let envelope: Value = serde_json::from_slice(payload)
        .map_err(|e| OcppError::protocol_error(format!("envelope is not valid JSON: {e}")))?;
    let envelope = envelope
        .as_object()
        .ok_or_else(|| OcppError::protocol_error("envelope is not a JSON object"))?;

    let message_type = match envelope.get("type").and_then(Value::as_str) {
        Some("call") => MessageType::Call,
        Some("call_result") => MessageType::CallResult,
        Some("call_error") => MessageType::CallError,
        Some(other) => {
            return Err(OcppError::protocol_error(format!(
                "unknown message type {other}"
            )))
        }
        None => return Err(OcppError::protocol_error("envelope without message type")),
    };

    let action = envelope
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if action.is_empty() {
        return Err(OcppError::format_violation("envelope without action"));
    }
    let message_id = envelope
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if message_id.is_empty() {
        return Err(OcppError::format_violation("envelope without message id"));
    }

    Ok(Message {
        message_type,
        action,
        message_id,
        request_payload: raw_field(envelope, "request")?,
        response_payload: raw_field(envelope, "response")?,
        state: raw_field(envelope, "state")?,
        error_code: envelope
            .get("error_code")
            .and_then(|value| serde_json::from_value::<ErrorCode>(value.clone()).ok()),
        error_description: envelope
            .get("error_description")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

pub fn encode(message: &Message) -> Result<Vec<u8>, OcppError> {
    let mut envelope = serde_json::Map::new();
    let message_type = match message.message_type {
        MessageType::Call => "call",
        MessageType::CallResult => "call_result",
        MessageType::CallError => "call_error",
    };
    envelope.insert("type".to_string(), Value::String(message_type.to_string()));
    envelope.insert("action".to_string(), Value::String(message.action.clone()));
    envelope.insert("id".to_string(), Value::String(message.message_id.clone()));

    insert_raw_field(&mut envelope, "request", message.request_payload.as_deref())?;
    insert_raw_field(&mut envelope, "response", message.response_payload.as_deref())?;
    insert_raw_field(&mut envelope, "state", message.state.as_deref())?;
    if let Some(code) = message.error_code {
        envelope.insert("error_code".to_string(), Value::String(code.to_string()));
    }
    if let Some(description) = &message.error_description {
        envelope.insert(
            "error_description".to_string(),
            Value::String(description.clone()),
        );
    }

    serde_json::to_vec(&envelope)
        .map_err(|e| OcppError::internal_error(format!("encoding envelope: {e}")))
}

fn raw_field(
    envelope: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<Option<Vec<u8>>, OcppError> {
    match envelope.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::to_vec(value)
            .map(Some)
            .map_err(|e| OcppError::protocol_error(format!("reading {field} payload: {e}"))),
    }
}

fn insert_raw_field(
    envelope: &mut serde_json::Map<String, Value>,
    field: &str,
    payload: Option<&[u8]>,
) -> Result<(), OcppError> {
    if let Some(bytes) = payload {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| {
            OcppError::internal_error(format!("{field} payload is not valid JSON: {e}"))
        })?;
        envelope.insert(field.to_string(), value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_call() {
        let message = decode(
            br#"{"type":"call","action":"BootNotification","id":"m1","request":{"chargePointVendor":"vf"}}"#,
        )
        .unwrap();
        assert_eq!(message.message_type, MessageType::Call);
        assert_eq!(message.action, "BootNotification");
        assert_eq!(message.message_id, "m1");
        assert_eq!(
            message.request_payload.as_deref(),
            Some(br#"{"chargePointVendor":"vf"}"#.as_slice())
        );
    }

    #[test]
    fn unknown_message_type_is_a_protocol_error() {
        let err = decode(br#"{"type":"call_bizarre","action":"Heartbeat","id":"m1"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProtocolError);
    }

    #[test]
    fn empty_action_is_a_format_violation() {
        let err = decode(br#"{"type":"call","action":"","id":"m1"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::FormatViolation);
    }

    #[test]
    fn empty_message_id_is_a_format_violation() {
        let err = decode(br#"{"type":"call","action":"Heartbeat","id":""}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::FormatViolation);
    }

    #[test]
    fn malformed_json_is_a_protocol_error() {
        let err = decode(b"[not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::ProtocolError);
    }

    #[test]
    fn round_trips_a_call_result() {
        let mut message = Message::call_result("Heartbeat", "m7", br#"{"currentTime":"t"}"#.to_vec());
        message.state = Some(br#"{"csr":"x"}"#.to_vec());
        let decoded = decode(&encode(&message).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn decodes_a_call_error() {
        let message = decode(
            br#"{"type":"call_error","action":"CertificateSigned","id":"m9","error_code":"SecurityError","error_description":"bad signature"}"#,
        )
        .unwrap();
        assert_eq!(message.message_type, MessageType::CallError);
        assert_eq!(message.error_code, Some(ErrorCode::SecurityError));
        assert_eq!(message.error_description.as_deref(), Some("bad signature"));
    }
}
