use crate::error::DomainResult;
use crate::routing::Emitter;
use crate::store::{PendingCall, PendingCallStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use voltflow_ocpp::error::OcppError;
use voltflow_ocpp::message::Message;
use voltflow_ocpp::v16::{DataTransferRequest, ReservationRequest};
use voltflow_ocpp::v201::CertificateSignedRequest;
use voltflow_ocpp::OcppRequest;

/// Request types that may travel as server-initiated calls, with their wire
/// action name.
pub trait CallAction {
    const ACTION: &'static str;
}

impl CallAction for CertificateSignedRequest {
    const ACTION: &'static str = "CertificateSigned";
}

impl CallAction for ReservationRequest {
    const ACTION: &'static str = "Reservation";
}

/// A server-initiated call ready for emission. `state` is an opaque blob
/// handed back to the result handler when the CallResult arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCall {
    pub action: String,
    pub request_payload: Vec<u8>,
    pub state: Option<Vec<u8>>,
}

impl OutgoingCall {
    pub fn new<R: CallAction + OcppRequest>(
        request: &R,
        state: Option<Vec<u8>>,
    ) -> DomainResult<Self> {
        let request_payload = serde_json::to_vec(request).map_err(|e| {
            OcppError::internal_error(format!("encoding {} call: {e}", R::ACTION))
        })?;
        Ok(Self {
            action: R::ACTION.to_string(),
            request_payload,
            state,
        })
    }
}

/// Originates server-initiated calls toward a charge station.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CallMaker: Send + Sync {
    async fn send(&self, charge_station_id: &str, call: OutgoingCall) -> DomainResult<()>;
}

/// Call maker for OCPP 2.0.1 stations: the typed request goes on the wire
/// under its own action name.
pub struct BasicCallMaker {
    emitter: Arc<dyn Emitter>,
    pending_calls: Arc<dyn PendingCallStore>,
}

impl BasicCallMaker {
    pub fn new(emitter: Arc<dyn Emitter>, pending_calls: Arc<dyn PendingCallStore>) -> Self {
        Self {
            emitter,
            pending_calls,
        }
    }
}

#[async_trait]
impl CallMaker for BasicCallMaker {
    async fn send(&self, charge_station_id: &str, call: OutgoingCall) -> DomainResult<()> {
        let message_id = Uuid::new_v4().to_string();
        // Persist first: a fast CallResult must find the record.
        self.pending_calls
            .put(
                charge_station_id,
                &message_id,
                PendingCall {
                    action: call.action.clone(),
                    request_payload: call.request_payload.clone(),
                    state: call.state.clone(),
                },
            )
            .await?;

        debug!(charge_station_id, action = %call.action, message_id, "sending call");
        let mut message = Message::call(&call.action, &message_id, call.request_payload);
        message.state = call.state;
        self.emitter.emit(charge_station_id, &message).await
    }
}

/// DataTransfer coordinates a logical 2.0.1 action rides under on a 1.6
/// station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTransferAction {
    pub vendor_id: String,
    pub message_id: String,
}

/// Call maker for OCPP 1.6 stations: the typed request is wrapped in a
/// DataTransfer envelope keyed by the configured `(vendor_id, message_id)`.
pub struct DataTransferCallMaker {
    emitter: Arc<dyn Emitter>,
    pending_calls: Arc<dyn PendingCallStore>,
    actions: HashMap<String, DataTransferAction>,
}

impl DataTransferCallMaker {
    pub fn new(
        emitter: Arc<dyn Emitter>,
        pending_calls: Arc<dyn PendingCallStore>,
        actions: HashMap<String, DataTransferAction>,
    ) -> Self {
        Self {
            emitter,
            pending_calls,
            actions,
        }
    }
}

#[async_trait]
impl CallMaker for DataTransferCallMaker {
    async fn send(&self, charge_station_id: &str, call: OutgoingCall) -> DomainResult<()> {
        let mapping = self.actions.get(&call.action).ok_or_else(|| {
            OcppError::not_implemented(&format!("DataTransfer wrapping for {}", call.action))
        })?;

        let data = String::from_utf8(call.request_payload).map_err(|e| {
            OcppError::internal_error(format!("{} call payload is not utf-8: {e}", call.action))
        })?;
        let wrapped = DataTransferRequest {
            vendor_id: mapping.vendor_id.clone(),
            message_id: Some(mapping.message_id.clone()),
            data: Some(data),
        };
        let request_payload = serde_json::to_vec(&wrapped).map_err(|e| {
            OcppError::internal_error(format!("encoding wrapped {} call: {e}", call.action))
        })?;

        let message_id = Uuid::new_v4().to_string();
        // The pending record carries the *wrapped* request so the
        // DataTransfer result route can rehydrate and re-enter the tunnel.
        self.pending_calls
            .put(
                charge_station_id,
                &message_id,
                PendingCall {
                    action: "DataTransfer".to_string(),
                    request_payload: request_payload.clone(),
                    state: call.state.clone(),
                },
            )
            .await?;

        debug!(
            charge_station_id,
            action = %call.action,
            vendor_id = %mapping.vendor_id,
            message_id,
            "sending data transfer call"
        );
        let mut message = Message::call("DataTransfer", &message_id, request_payload);
        message.state = call.state;
        self.emitter.emit(charge_station_id, &message).await
    }
}
