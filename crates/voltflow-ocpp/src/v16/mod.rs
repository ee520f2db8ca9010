//! Typed OCPP 1.6J messages supported by the manager.

mod authorize;
mod boot_notification;
mod data_transfer;
mod heartbeat;
mod meter_values;
mod reservation;
mod start_transaction;
mod status_notification;
mod stop_transaction;

pub use authorize::{AuthorizationStatus, AuthorizeRequest, AuthorizeResponse, IdTagInfo};
pub use boot_notification::{BootNotificationRequest, BootNotificationResponse, RegistrationStatus};
pub use data_transfer::{DataTransferRequest, DataTransferResponse, DataTransferStatus};
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse};
pub use meter_values::{MeterValue, MeterValuesRequest, MeterValuesResponse, SampledValue};
pub use reservation::{ReservationRequest, ReservationResponse, ReservationStatus};
pub use start_transaction::{StartTransactionRequest, StartTransactionResponse};
pub use status_notification::{StatusNotificationRequest, StatusNotificationResponse};
pub use stop_transaction::{StopTransactionRequest, StopTransactionResponse};
