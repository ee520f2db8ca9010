use crate::error::{DomainError, DomainResult};
use crate::routing::{CallHandler, CallRoute};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use voltflow_ocpp::error::{ErrorCode, OcppError};
use voltflow_ocpp::schema::SchemaRegistry;
use voltflow_ocpp::v16::{DataTransferRequest, DataTransferResponse, DataTransferStatus};

/// Tunnel router for vendor payloads carried inside a 1.6 DataTransfer.
///
/// Routes are keyed by `(vendor_id, message_id)`; a known pair re-enters the
/// regular schema validation and typed dispatch flow with the tunneled
/// (2.0.1) schemas. Unknown pairs are a *successful* DataTransfer exchange
/// with the corresponding status, never a protocol error.
pub struct DataTransferHandler {
    pub schemas: Arc<SchemaRegistry>,
    pub call_routes: HashMap<String, HashMap<String, CallRoute>>,
}

#[async_trait]
impl CallHandler for DataTransferHandler {
    type Request = DataTransferRequest;
    type Response = DataTransferResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let Some(vendor_routes) = self.call_routes.get(&request.vendor_id) else {
            debug!(charge_station_id, vendor_id = %request.vendor_id, "unknown data transfer vendor");
            return Ok(DataTransferResponse {
                status: DataTransferStatus::UnknownVendorId,
                data: None,
            });
        };
        let Some(route) = request
            .message_id
            .as_ref()
            .and_then(|message_id| vendor_routes.get(message_id))
        else {
            debug!(
                charge_station_id,
                vendor_id = %request.vendor_id,
                message_id = request.message_id.as_deref().unwrap_or(""),
                "unknown data transfer message"
            );
            return Ok(DataTransferResponse {
                status: DataTransferStatus::UnknownMessageId,
                data: None,
            });
        };
        let action = request.message_id.as_deref().unwrap_or_default();
        let data = request.data.as_deref().unwrap_or("{}");

        match self.schemas.validate(data.as_bytes(), route.request_schema) {
            Ok(()) => {}
            Err(err) if err.is_violation() => {
                return Err(OcppError::format_violation(format!(
                    "validating tunneled {action} request: {err}"
                ))
                .into());
            }
            Err(err) => return Err(DomainError::Schema(err)),
        }

        let inner_response = route
            .dispatch(charge_station_id, data.as_bytes(), action)
            .await?;
        let inner_json = serde_json::to_string(&inner_response).map_err(|e| {
            OcppError::internal_error(format!("encoding tunneled {action} response: {e}"))
        })?;
        if let Err(err) = self
            .schemas
            .validate(inner_json.as_bytes(), route.response_schema)
        {
            warn!(
                action,
                code = %ErrorCode::PropertyConstraintViolation,
                error = %err,
                "tunneled response failed schema validation"
            );
        }

        Ok(DataTransferResponse {
            status: DataTransferStatus::Accepted,
            data: Some(inner_json),
        })
    }
}
