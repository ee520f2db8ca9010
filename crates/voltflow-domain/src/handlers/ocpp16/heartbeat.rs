use crate::clock::Clock;
use crate::error::DomainResult;
use crate::routing::CallHandler;
use async_trait::async_trait;
use chrono::SecondsFormat;
use std::sync::Arc;
use voltflow_ocpp::v16::{HeartbeatRequest, HeartbeatResponse};

pub struct HeartbeatHandler {
    pub clock: Arc<dyn Clock>,
}

#[async_trait]
impl CallHandler for HeartbeatHandler {
    type Request = HeartbeatRequest;
    type Response = HeartbeatResponse;

    async fn handle_call(
        &self,
        _charge_station_id: &str,
        _request: Self::Request,
    ) -> DomainResult<Self::Response> {
        Ok(HeartbeatResponse {
            current_time: self
                .clock
                .now()
                .to_rfc3339_opts(SecondsFormat::Secs, false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    #[tokio::test]
    async fn returns_clock_time() {
        let handler = HeartbeatHandler {
            clock: Arc::new(FixedClock::at_rfc3339("2023-06-15T15:05:00+01:00")),
        };

        let got = handler
            .handle_call("cs001", HeartbeatRequest {})
            .await
            .unwrap();

        assert_eq!(
            got,
            HeartbeatResponse {
                current_time: "2023-06-15T15:05:00+01:00".to_string(),
            }
        );
    }
}
