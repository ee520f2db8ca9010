use crate::clock::Clock;
use crate::error::DomainResult;
use crate::routing::CallHandler;
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use voltflow_ocpp::v201::{BootNotificationRequest, BootNotificationResponse, RegistrationStatus};

pub struct BootNotificationHandler {
    pub clock: Arc<dyn Clock>,
    pub heartbeat_interval: Duration,
}

#[async_trait]
impl CallHandler for BootNotificationHandler {
    type Request = BootNotificationRequest;
    type Response = BootNotificationResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        info!(
            charge_station_id,
            vendor = %request.charging_station.vendor_name,
            model = %request.charging_station.model,
            reason = %request.reason,
            "charge station booted"
        );

        Ok(BootNotificationResponse {
            current_time: self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Secs, false),
            interval: self.heartbeat_interval.as_secs() as i32,
            status: RegistrationStatus::Accepted,
        })
    }
}
