//! Typed OCPP 2.0.1 messages supported by the manager, both for direct
//! 2.0.1 stations and for PnC payloads tunneled through a 1.6 DataTransfer.

mod authorize;
mod boot_notification;
mod certificate_signed;
mod get_15118_ev_certificate;
mod get_certificate_status;
mod heartbeat;
mod sign_certificate;
mod status_notification;
mod transaction_event;

pub use authorize::{
    AuthorizationStatus, AuthorizeCertificateStatus, AuthorizeRequest, AuthorizeResponse,
    HashAlgorithm, IdToken, IdTokenInfo, OcspRequestData,
};
pub use boot_notification::{
    BootNotificationRequest, BootNotificationResponse, ChargingStation, Modem, RegistrationStatus,
};
pub use certificate_signed::{
    CertificateSignedRequest, CertificateSignedResponse, CertificateSignedStatus,
};
pub use get_15118_ev_certificate::{
    CertificateAction, Get15118EVCertificateRequest, Get15118EVCertificateResponse,
    Iso15118EVCertificateStatus,
};
pub use get_certificate_status::{
    GetCertificateStatusRequest, GetCertificateStatusResponse, GetCertificateStatusStatus,
};
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse};
pub use sign_certificate::{GenericStatus, SignCertificateRequest, SignCertificateResponse};
pub use status_notification::{StatusNotificationRequest, StatusNotificationResponse};
pub use transaction_event::{
    Evse, MeterValue, SampledValue, TransactionEventRequest, TransactionEventResponse,
    TransactionEventType, TransactionInfo, UnitOfMeasure,
};
