use crate::{OcppRequest, OcppResponse};
use serde::{Deserialize, Serialize};

/// Server-initiated request reserving a connector for an id tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub reservation_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<i32>,
    pub expiry_date: String,
    pub id_tag: String,
}

impl OcppRequest for ReservationRequest {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Accepted,
    Faulted,
    Occupied,
    Rejected,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub status: ReservationStatus,
}

impl OcppResponse for ReservationResponse {}
