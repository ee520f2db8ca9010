use crate::error::{DomainError, DomainResult};
use crate::routing::{CallResultHandler, CallResultRoute};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use voltflow_ocpp::error::{ErrorCode, OcppError};
use voltflow_ocpp::schema::SchemaRegistry;
use voltflow_ocpp::v16::{DataTransferRequest, DataTransferResponse, DataTransferStatus};

/// Result side of the tunnel: a server-initiated call that went out wrapped
/// in a DataTransfer comes back the same way, and the inner result route is
/// selected from the `(vendor_id, message_id)` of the original request.
pub struct DataTransferResultHandler {
    pub schemas: Arc<SchemaRegistry>,
    pub call_result_routes: HashMap<String, HashMap<String, CallResultRoute>>,
}

#[async_trait]
impl CallResultHandler for DataTransferResultHandler {
    type Request = DataTransferRequest;
    type Response = DataTransferResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: Self::Request,
        response: Self::Response,
        state: Option<&[u8]>,
    ) -> DomainResult<()> {
        let message_id = request.message_id.as_deref().ok_or_else(|| {
            OcppError::format_violation("data transfer result without message id")
        })?;
        let route = self
            .call_result_routes
            .get(&request.vendor_id)
            .and_then(|vendor_routes| vendor_routes.get(message_id))
            .ok_or_else(|| {
                OcppError::new(
                    ErrorCode::NotImplemented,
                    format!(
                        "data transfer result {}/{message_id} not implemented",
                        request.vendor_id
                    ),
                )
            })?;

        if response.status != DataTransferStatus::Accepted {
            return Err(OcppError::new(
                ErrorCode::GenericError,
                format!("tunneled {message_id} call rejected with {:?}", response.status),
            )
            .into());
        }

        let inner_request = request.data.as_deref().ok_or_else(|| {
            OcppError::format_violation("data transfer result without request data")
        })?;
        let inner_response = response.data.as_deref().ok_or_else(|| {
            OcppError::format_violation("data transfer result without response data")
        })?;

        // Same validation contract as the top-level CallResult flow: the
        // original request reflects our own state, the response is coerced.
        self.schemas
            .validate(inner_request.as_bytes(), route.request_schema)?;
        match self
            .schemas
            .validate(inner_response.as_bytes(), route.response_schema)
        {
            Ok(()) => {}
            Err(err) if err.is_violation() => {
                return Err(OcppError::format_violation(format!(
                    "validating tunneled {message_id} response: {err}"
                ))
                .into());
            }
            Err(err) => return Err(DomainError::Schema(err)),
        }

        route
            .dispatch(
                charge_station_id,
                inner_request.as_bytes(),
                inner_response.as_bytes(),
                state,
                message_id,
            )
            .await
    }
}
