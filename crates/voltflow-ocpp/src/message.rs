use crate::error::ErrorCode;

/// The three OCPP message kinds that travel over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call,
    CallResult,
    CallError,
}

/// Bus envelope, as consumed and produced by the router.
///
/// Payloads are raw bytes: the envelope never interprets them beyond handing
/// them to the schema validator and the typed decoders. `state` is an opaque
/// blob the call maker attached when it originated a call; the gateway echoes
/// it back alongside the CallResult when it supports doing so.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_type: MessageType,
    pub action: String,
    pub message_id: String,
    pub request_payload: Option<Vec<u8>>,
    pub response_payload: Option<Vec<u8>>,
    pub state: Option<Vec<u8>>,
    pub error_code: Option<ErrorCode>,
    pub error_description: Option<String>,
}

impl Message {
    /// A station-originated (or synthetic tunneled) Call.
    pub fn call(action: impl Into<String>, message_id: impl Into<String>, request: Vec<u8>) -> Self {
        Self {
            message_type: MessageType::Call,
            action: action.into(),
            message_id: message_id.into(),
            request_payload: Some(request),
            response_payload: None,
            state: None,
            error_code: None,
            error_description: None,
        }
    }

    /// The manager's reply to a Call, correlated by the original message id.
    pub fn call_result(
        action: impl Into<String>,
        message_id: impl Into<String>,
        response: Vec<u8>,
    ) -> Self {
        Self {
            message_type: MessageType::CallResult,
            action: action.into(),
            message_id: message_id.into(),
            request_payload: None,
            response_payload: Some(response),
            state: None,
            error_code: None,
            error_description: None,
        }
    }
}
