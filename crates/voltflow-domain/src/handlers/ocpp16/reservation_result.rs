use crate::error::DomainResult;
use crate::routing::CallResultHandler;
use async_trait::async_trait;
use tracing::{info, warn};
use voltflow_ocpp::v16::{ReservationRequest, ReservationResponse, ReservationStatus};

/// Result of a server-initiated reservation: the station either holds the
/// connector or names why it cannot.
pub struct ReservationResultHandler;

#[async_trait]
impl CallResultHandler for ReservationResultHandler {
    type Request = ReservationRequest;
    type Response = ReservationResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        request: Self::Request,
        response: Self::Response,
        _state: Option<&[u8]>,
    ) -> DomainResult<()> {
        match response.status {
            ReservationStatus::Accepted => {
                info!(
                    charge_station_id,
                    reservation_id = request.reservation_id,
                    id_tag = %request.id_tag,
                    expiry_date = %request.expiry_date,
                    "reservation accepted"
                );
            }
            status => {
                warn!(
                    charge_station_id,
                    reservation_id = request.reservation_id,
                    id_tag = %request.id_tag,
                    status = ?status,
                    "reservation not placed"
                );
            }
        }
        Ok(())
    }
}
