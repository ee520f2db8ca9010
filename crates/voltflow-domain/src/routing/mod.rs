//! Version-aware dispatch of bus envelopes onto typed domain handlers.
//!
//! A route binds an action to its request/response schemas and a typed
//! handler; the route table is immutable once the router is built. The
//! DataTransfer tunnel reuses the same route shapes keyed by
//! `(vendor_id, message_id)`, so nested routing is just a second table.

mod call_maker;
mod router;
mod tables;

pub use call_maker::{
    BasicCallMaker, CallAction, CallMaker, DataTransferAction, DataTransferCallMaker, OutgoingCall,
};
pub use router::Router;
pub use tables::{v16_router, v201_router, RouterDependencies, ISO_15118_PNC_VENDOR_ID};

#[cfg(any(test, feature = "testing"))]
pub use call_maker::MockCallMaker;

use crate::error::DomainResult;
use async_trait::async_trait;
use std::sync::Arc;
use voltflow_ocpp::error::OcppError;
use voltflow_ocpp::message::Message;
use voltflow_ocpp::{OcppRequest, OcppResponse};

/// Emits envelopes toward a charge station.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Emitter: Send + Sync {
    async fn emit(&self, charge_station_id: &str, message: &Message) -> DomainResult<()>;
}

/// Typed handler for a station-originated Call. The route table erases the
/// request/response types, so handlers never downcast.
#[async_trait]
pub trait CallHandler: Send + Sync + 'static {
    type Request: OcppRequest;
    type Response: OcppResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response>;
}

/// Typed handler for the CallResult of a server-initiated call. `state` is
/// the opaque blob the call maker persisted when it emitted the call.
#[async_trait]
pub trait CallResultHandler: Send + Sync + 'static {
    type Request: OcppRequest;
    type Response: OcppResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: Self::Request,
        response: Self::Response,
        state: Option<&[u8]>,
    ) -> DomainResult<()>;
}

#[async_trait]
trait ErasedCallHandler: Send + Sync {
    async fn handle(
        &self,
        charge_station_id: &str,
        payload: &[u8],
        action: &str,
    ) -> DomainResult<serde_json::Value>;
}

struct TypedCall<H>(H);

#[async_trait]
impl<H: CallHandler> ErasedCallHandler for TypedCall<H> {
    async fn handle(
        &self,
        charge_station_id: &str,
        payload: &[u8],
        action: &str,
    ) -> DomainResult<serde_json::Value> {
        let request: H::Request = serde_json::from_slice(payload).map_err(|e| {
            OcppError::format_violation(format!("decoding {action} request payload: {e}"))
        })?;
        let response = self.0.handle_call(charge_station_id, request).await?;
        serde_json::to_value(&response).map_err(|e| {
            OcppError::internal_error(format!("encoding {action} response: {e}")).into()
        })
    }
}

#[async_trait]
trait ErasedCallResultHandler: Send + Sync {
    async fn handle(
        &self,
        charge_station_id: &str,
        request_payload: &[u8],
        response_payload: &[u8],
        state: Option<&[u8]>,
        action: &str,
    ) -> DomainResult<()>;
}

struct TypedCallResult<H>(H);

#[async_trait]
impl<H: CallResultHandler> ErasedCallResultHandler for TypedCallResult<H> {
    async fn handle(
        &self,
        charge_station_id: &str,
        request_payload: &[u8],
        response_payload: &[u8],
        state: Option<&[u8]>,
        action: &str,
    ) -> DomainResult<()> {
        let request: H::Request = serde_json::from_slice(request_payload).map_err(|e| {
            OcppError::format_violation(format!("decoding {action} request payload: {e}"))
        })?;
        let response: H::Response = serde_json::from_slice(response_payload).map_err(|e| {
            OcppError::format_violation(format!("decoding {action} response payload: {e}"))
        })?;
        self.0
            .handle_call_result(charge_station_id, request, response, state)
            .await
    }
}

/// Route for a station-originated Call.
#[derive(Clone)]
pub struct CallRoute {
    pub request_schema: &'static str,
    pub response_schema: &'static str,
    handler: Arc<dyn ErasedCallHandler>,
}

impl CallRoute {
    pub fn new<H: CallHandler>(
        request_schema: &'static str,
        response_schema: &'static str,
        handler: H,
    ) -> Self {
        Self {
            request_schema,
            response_schema,
            handler: Arc::new(TypedCall(handler)),
        }
    }

    pub(crate) async fn dispatch(
        &self,
        charge_station_id: &str,
        payload: &[u8],
        action: &str,
    ) -> DomainResult<serde_json::Value> {
        self.handler.handle(charge_station_id, payload, action).await
    }
}

/// Route for the CallResult of a server-initiated call.
#[derive(Clone)]
pub struct CallResultRoute {
    pub request_schema: &'static str,
    pub response_schema: &'static str,
    handler: Arc<dyn ErasedCallResultHandler>,
}

impl CallResultRoute {
    pub fn new<H: CallResultHandler>(
        request_schema: &'static str,
        response_schema: &'static str,
        handler: H,
    ) -> Self {
        Self {
            request_schema,
            response_schema,
            handler: Arc::new(TypedCallResult(handler)),
        }
    }

    pub(crate) async fn dispatch(
        &self,
        charge_station_id: &str,
        request_payload: &[u8],
        response_payload: &[u8],
        state: Option<&[u8]>,
        action: &str,
    ) -> DomainResult<()> {
        self.handler
            .handle(charge_station_id, request_payload, response_payload, state, action)
            .await
    }
}
