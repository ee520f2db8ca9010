use crate::error::DomainResult;
use crate::routing::CallHandler;
use async_trait::async_trait;
use tracing::info;
use voltflow_ocpp::v16::{StatusNotificationRequest, StatusNotificationResponse};

/// Log-and-acknowledge; connector state is not tracked by the manager.
pub struct StatusNotificationHandler;

#[async_trait]
impl CallHandler for StatusNotificationHandler {
    type Request = StatusNotificationRequest;
    type Response = StatusNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        info!(
            charge_station_id,
            connector_id = request.connector_id,
            status = %request.status,
            error_code = %request.error_code,
            "status notification"
        );
        Ok(StatusNotificationResponse {})
    }
}
