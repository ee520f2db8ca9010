//! Handlers for OCPP 2.0.1, reached directly by 2.0.1 stations or through
//! the 1.6 DataTransfer tunnel (the handler cannot tell the difference).

mod authorize;
mod boot_notification;
mod certificate_signed_result;
mod get_15118_ev_certificate;
mod get_certificate_status;
mod heartbeat;
mod sign_certificate;
mod status_notification;
mod transaction_event;

pub use authorize::AuthorizeHandler;
pub use boot_notification::BootNotificationHandler;
pub use certificate_signed_result::CertificateSignedResultHandler;
pub use get_15118_ev_certificate::Get15118EvCertificateHandler;
pub use get_certificate_status::GetCertificateStatusHandler;
pub use heartbeat::HeartbeatHandler;
pub use sign_certificate::{SignCertificateHandler, SignCertificateState};
pub use status_notification::StatusNotificationHandler;
pub use transaction_event::TransactionEventHandler;
