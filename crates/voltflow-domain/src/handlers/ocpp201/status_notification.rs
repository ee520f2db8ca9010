use crate::error::DomainResult;
use crate::routing::CallHandler;
use async_trait::async_trait;
use tracing::info;
use voltflow_ocpp::v201::{StatusNotificationRequest, StatusNotificationResponse};

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
            evse_id = request.evse_id,
            connector_id = request.connector_id,
            status = %request.connector_status,
            "status notification"
        );
        Ok(StatusNotificationResponse {})
    }
}
