use crate::error::{DomainError, DomainResult};
use crate::routing::{CallResultRoute, CallRoute, Emitter};
use crate::store::PendingCallStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use voltflow_ocpp::error::{ErrorCode, OcppError};
use voltflow_ocpp::message::{Message, MessageType};
use voltflow_ocpp::schema::SchemaRegistry;

/// Dispatches envelopes for one OCPP version. Tables are immutable after
/// construction; the router holds no other state and can be shared freely
/// across workers.
pub struct Router {
    call_routes: HashMap<&'static str, CallRoute>,
    call_result_routes: HashMap<&'static str, CallResultRoute>,
    schemas: Arc<SchemaRegistry>,
    pending_calls: Arc<dyn PendingCallStore>,
}

impl Router {
    pub fn new(
        call_routes: HashMap<&'static str, CallRoute>,
        call_result_routes: HashMap<&'static str, CallResultRoute>,
        schemas: Arc<SchemaRegistry>,
        pending_calls: Arc<dyn PendingCallStore>,
    ) -> Self {
        Self {
            call_routes,
            call_result_routes,
            schemas,
            pending_calls,
        }
    }

    /// Actions the router answers as Calls.
    pub fn call_actions(&self) -> Vec<&'static str> {
        let mut actions: Vec<_> = self.call_routes.keys().copied().collect();
        actions.sort_unstable();
        actions
    }

    /// Actions the router correlates as CallResults.
    pub fn call_result_actions(&self) -> Vec<&'static str> {
        let mut actions: Vec<_> = self.call_result_routes.keys().copied().collect();
        actions.sort_unstable();
        actions
    }

    #[instrument(
        name = "route",
        skip_all,
        fields(
            charge_station_id = %charge_station_id,
            action = %message.action,
            message_id = %message.message_id,
        )
    )]
    pub async fn route(
        &self,
        charge_station_id: &str,
        message: &Message,
        emitter: &dyn Emitter,
    ) -> DomainResult<()> {
        match message.message_type {
            MessageType::Call => self.route_call(charge_station_id, message, emitter).await,
            MessageType::CallResult => self.route_call_result(charge_station_id, message).await,
            MessageType::CallError => self.route_call_error(charge_station_id, message).await,
        }
    }

    async fn route_call(
        &self,
        charge_station_id: &str,
        message: &Message,
        emitter: &dyn Emitter,
    ) -> DomainResult<()> {
        let route = self
            .call_routes
            .get(message.action.as_str())
            .ok_or_else(|| OcppError::not_implemented(&message.action))?;

        let payload = message.request_payload.as_deref().ok_or_else(|| {
            OcppError::format_violation(format!("{} call without request payload", message.action))
        })?;

        self.validate_request(payload, route.request_schema, &message.action)?;

        let response = route
            .dispatch(charge_station_id, payload, &message.action)
            .await?;
        let response_payload = serde_json::to_vec(&response).map_err(|e| {
            OcppError::internal_error(format!("encoding {} response: {e}", message.action))
        })?;

        // A non-conformant response is our bug, not the station's: log it
        // and transmit anyway rather than dropping the exchange.
        if let Err(err) = self.schemas.validate(&response_payload, route.response_schema) {
            warn!(
                code = %ErrorCode::PropertyConstraintViolation,
                error = %err,
                "response failed schema validation"
            );
        }

        let out = Message::call_result(&message.action, &message.message_id, response_payload);
        emitter.emit(charge_station_id, &out).await
    }

    async fn route_call_result(&self, charge_station_id: &str, message: &Message) -> DomainResult<()> {
        let route = self
            .call_result_routes
            .get(message.action.as_str())
            .ok_or_else(|| {
                OcppError::new(
                    ErrorCode::NotImplemented,
                    format!("{} result not implemented", message.action),
                )
            })?;

        // The gateway may echo the original request and state; when it does
        // not, the pending-call record fills them in. Either way the record
        // is consumed so retention cannot leak.
        let pending = self
            .pending_calls
            .take(charge_station_id, &message.message_id)
            .await?;
        let (request_payload, state) = match (message.request_payload.clone(), pending) {
            (Some(request), record) => {
                let state = message
                    .state
                    .clone()
                    .or_else(|| record.and_then(|r| r.state));
                (request, state)
            }
            (None, Some(record)) => (record.request_payload, record.state),
            (None, None) => {
                return Err(OcppError::internal_error(format!(
                    "no pending call for {} result with message id {}",
                    message.action, message.message_id
                ))
                .into());
            }
        };

        // A bad original request means our own pending-call state is
        // corrupt; the error kind is deliberately not coerced.
        self.schemas
            .validate(&request_payload, route.request_schema)?;

        let response_payload = message.response_payload.as_deref().ok_or_else(|| {
            OcppError::format_violation(format!(
                "{} result without response payload",
                message.action
            ))
        })?;
        self.validate_request(response_payload, route.response_schema, &message.action)?;

        route
            .dispatch(
                charge_station_id,
                &request_payload,
                response_payload,
                state.as_deref(),
                &message.action,
            )
            .await
    }

    async fn route_call_error(&self, charge_station_id: &str, message: &Message) -> DomainResult<()> {
        // Log-and-discard policy; retry behavior is an open protocol
        // question. The pending record is still consumed.
        let pending = self
            .pending_calls
            .take(charge_station_id, &message.message_id)
            .await?;
        info!(
            error_code = ?message.error_code,
            error_description = message.error_description.as_deref().unwrap_or(""),
            pending_action = pending.map(|p| p.action).as_deref().unwrap_or("unknown"),
            "charge station returned call error"
        );
        Ok(())
    }

    fn validate_request(
        &self,
        payload: &[u8],
        schema_name: &'static str,
        action: &str,
    ) -> DomainResult<()> {
        match self.schemas.validate(payload, schema_name) {
            Ok(()) => Ok(()),
            Err(err) if err.is_violation() => Err(OcppError::format_violation(format!(
                "validating {action} against {schema_name}: {err}"
            ))
            .into()),
            Err(err) => Err(DomainError::Schema(err)),
        }
    }
}
