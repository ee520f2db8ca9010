//! Handlers for OCPP 1.6J stations, including the DataTransfer tunnel that
//! carries ISO 15118 PnC payloads with 2.0.1 semantics.

mod authorize;
mod boot_notification;
mod data_transfer;
mod data_transfer_result;
mod heartbeat;
mod meter_values;
mod reservation_result;
mod start_transaction;
mod status_notification;
mod stop_transaction;

pub use authorize::AuthorizeHandler;
pub use boot_notification::BootNotificationHandler;
pub use data_transfer::DataTransferHandler;
pub use data_transfer_result::DataTransferResultHandler;
pub use heartbeat::HeartbeatHandler;
pub use meter_values::MeterValuesHandler;
pub use reservation_result::ReservationResultHandler;
pub use start_transaction::StartTransactionHandler;
pub use status_notification::StatusNotificationHandler;
pub use stop_transaction::StopTransactionHandler;
