//! Route-table construction for both protocol versions.
//!
//! Tables bind every supported action to its schemas and a fully wired
//! handler; the returned routers are immutable.

use crate::clock::Clock;
use crate::handlers::{ocpp16, ocpp201};
use crate::routing::{
    BasicCallMaker, CallResultRoute, CallRoute, DataTransferAction, DataTransferCallMaker, Emitter,
    Router,
};
use crate::services::{
    CertificateSignerService, CertificateValidationService, EvCertificateProvider, TariffService,
};
use crate::store::{PendingCallStore, TokenStore, TransactionStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use voltflow_ocpp::schema::SchemaRegistry;

/// Vendor id under which ISO 15118 PnC payloads tunnel through a 1.6
/// DataTransfer.
pub const ISO_15118_PNC_VENDOR_ID: &str = "org.openchargealliance.iso15118pnc";

/// Everything the route tables need; construction-time wiring only.
#[derive(Clone)]
pub struct RouterDependencies {
    pub clock: Arc<dyn Clock>,
    pub token_store: Arc<dyn TokenStore>,
    pub transaction_store: Arc<dyn TransactionStore>,
    pub pending_call_store: Arc<dyn PendingCallStore>,
    pub tariff_service: Arc<dyn TariffService>,
    pub certificate_validation: Arc<dyn CertificateValidationService>,
    pub certificate_signer: Option<Arc<dyn CertificateSignerService>>,
    pub ev_certificate_provider: Option<Arc<dyn EvCertificateProvider>>,
    pub emitter: Arc<dyn Emitter>,
    pub schemas: Arc<SchemaRegistry>,
    pub heartbeat_interval: Duration,
}

/// Router for OCPP 1.6J stations. PnC messages are reachable only through
/// the DataTransfer tunnel.
pub fn v16_router(deps: &RouterDependencies) -> Router {
    let data_transfer_call_maker = Arc::new(DataTransferCallMaker::new(
        Arc::clone(&deps.emitter),
        Arc::clone(&deps.pending_call_store),
        HashMap::from([(
            "CertificateSigned".to_string(),
            DataTransferAction {
                vendor_id: ISO_15118_PNC_VENDOR_ID.to_string(),
                message_id: "CertificateSigned".to_string(),
            },
        )]),
    ));

    let tunneled_call_routes = HashMap::from([(
        ISO_15118_PNC_VENDOR_ID.to_string(),
        HashMap::from([
            (
                "Authorize".to_string(),
                CallRoute::new(
                    "ocpp201/AuthorizeRequest.json",
                    "ocpp201/AuthorizeResponse.json",
                    ocpp201::AuthorizeHandler {
                        token_store: Arc::clone(&deps.token_store),
                        certificate_validation: Some(Arc::clone(&deps.certificate_validation)),
                    },
                ),
            ),
            (
                "GetCertificateStatus".to_string(),
                CallRoute::new(
                    "ocpp201/GetCertificateStatusRequest.json",
                    "ocpp201/GetCertificateStatusResponse.json",
                    ocpp201::GetCertificateStatusHandler {
                        certificate_validation: Arc::clone(&deps.certificate_validation),
                    },
                ),
            ),
            (
                "SignCertificate".to_string(),
                CallRoute::new(
                    "ocpp201/SignCertificateRequest.json",
                    "ocpp201/SignCertificateResponse.json",
                    ocpp201::SignCertificateHandler {
                        certificate_signer: deps.certificate_signer.clone(),
                        call_maker: data_transfer_call_maker,
                    },
                ),
            ),
            (
                "Get15118EVCertificate".to_string(),
                CallRoute::new(
                    "ocpp201/Get15118EVCertificateRequest.json",
                    "ocpp201/Get15118EVCertificateResponse.json",
                    ocpp201::Get15118EvCertificateHandler {
                        ev_certificate_provider: deps.ev_certificate_provider.clone(),
                    },
                ),
            ),
        ]),
    )]);

    let call_routes = HashMap::from([
        (
            "BootNotification",
            CallRoute::new(
                "ocpp16/BootNotification.json",
                "ocpp16/BootNotificationResponse.json",
                ocpp16::BootNotificationHandler {
                    clock: Arc::clone(&deps.clock),
                    heartbeat_interval: deps.heartbeat_interval,
                },
            ),
        ),
        (
            "Heartbeat",
            CallRoute::new(
                "ocpp16/Heartbeat.json",
                "ocpp16/HeartbeatResponse.json",
                ocpp16::HeartbeatHandler {
                    clock: Arc::clone(&deps.clock),
                },
            ),
        ),
        (
            "StatusNotification",
            CallRoute::new(
                "ocpp16/StatusNotification.json",
                "ocpp16/StatusNotificationResponse.json",
                ocpp16::StatusNotificationHandler,
            ),
        ),
        (
            "Authorize",
            CallRoute::new(
                "ocpp16/Authorize.json",
                "ocpp16/AuthorizeResponse.json",
                ocpp16::AuthorizeHandler {
                    token_store: Arc::clone(&deps.token_store),
                },
            ),
        ),
        (
            "StartTransaction",
            CallRoute::new(
                "ocpp16/StartTransaction.json",
                "ocpp16/StartTransactionResponse.json",
                ocpp16::StartTransactionHandler {
                    token_store: Arc::clone(&deps.token_store),
                    transaction_store: Arc::clone(&deps.transaction_store),
                },
            ),
        ),
        (
            "StopTransaction",
            CallRoute::new(
                "ocpp16/StopTransaction.json",
                "ocpp16/StopTransactionResponse.json",
                ocpp16::StopTransactionHandler {
                    transaction_store: Arc::clone(&deps.transaction_store),
                    tariff_service: Arc::clone(&deps.tariff_service),
                },
            ),
        ),
        (
            "MeterValues",
            CallRoute::new(
                "ocpp16/MeterValues.json",
                "ocpp16/MeterValuesResponse.json",
                ocpp16::MeterValuesHandler {
                    transaction_store: Arc::clone(&deps.transaction_store),
                },
            ),
        ),
        (
            "DataTransfer",
            CallRoute::new(
                "ocpp16/DataTransfer.json",
                "ocpp16/DataTransferResponse.json",
                ocpp16::DataTransferHandler {
                    schemas: Arc::clone(&deps.schemas),
                    call_routes: tunneled_call_routes,
                },
            ),
        ),
    ]);

    let call_result_routes = HashMap::from([
        (
            "DataTransfer",
            CallResultRoute::new(
                "ocpp16/DataTransfer.json",
                "ocpp16/DataTransferResponse.json",
                ocpp16::DataTransferResultHandler {
                    schemas: Arc::clone(&deps.schemas),
                    call_result_routes: HashMap::from([(
                        ISO_15118_PNC_VENDOR_ID.to_string(),
                        HashMap::from([(
                            "CertificateSigned".to_string(),
                            CallResultRoute::new(
                                "ocpp201/CertificateSignedRequest.json",
                                "ocpp201/CertificateSignedResponse.json",
                                ocpp201::CertificateSignedResultHandler,
                            ),
                        )]),
                    )]),
                },
            ),
        ),
        (
            "Reservation",
            CallResultRoute::new(
                "ocpp16/Reservation.json",
                "ocpp16/ReservationResponse.json",
                ocpp16::ReservationResultHandler,
            ),
        ),
    ]);

    Router::new(
        call_routes,
        call_result_routes,
        Arc::clone(&deps.schemas),
        Arc::clone(&deps.pending_call_store),
    )
}

/// Router for OCPP 2.0.1 stations.
pub fn v201_router(deps: &RouterDependencies) -> Router {
    let call_maker = Arc::new(BasicCallMaker::new(
        Arc::clone(&deps.emitter),
        Arc::clone(&deps.pending_call_store),
    ));

    let call_routes = HashMap::from([
        (
            "BootNotification",
            CallRoute::new(
                "ocpp201/BootNotificationRequest.json",
                "ocpp201/BootNotificationResponse.json",
                ocpp201::BootNotificationHandler {
                    clock: Arc::clone(&deps.clock),
                    heartbeat_interval: deps.heartbeat_interval,
                },
            ),
        ),
        (
            "Heartbeat",
            CallRoute::new(
                "ocpp201/HeartbeatRequest.json",
                "ocpp201/HeartbeatResponse.json",
                ocpp201::HeartbeatHandler {
                    clock: Arc::clone(&deps.clock),
                },
            ),
        ),
        (
            "StatusNotification",
            CallRoute::new(
                "ocpp201/StatusNotificationRequest.json",
                "ocpp201/StatusNotificationResponse.json",
                ocpp201::StatusNotificationHandler,
            ),
        ),
        (
            "Authorize",
            CallRoute::new(
                "ocpp201/AuthorizeRequest.json",
                "ocpp201/AuthorizeResponse.json",
                ocpp201::AuthorizeHandler {
                    token_store: Arc::clone(&deps.token_store),
                    certificate_validation: Some(Arc::clone(&deps.certificate_validation)),
                },
            ),
        ),
        (
            "TransactionEvent",
            CallRoute::new(
                "ocpp201/TransactionEventRequest.json",
                "ocpp201/TransactionEventResponse.json",
                ocpp201::TransactionEventHandler {
                    token_store: Arc::clone(&deps.token_store),
                    transaction_store: Arc::clone(&deps.transaction_store),
                    tariff_service: Arc::clone(&deps.tariff_service),
                },
            ),
        ),
        (
            "GetCertificateStatus",
            CallRoute::new(
                "ocpp201/GetCertificateStatusRequest.json",
                "ocpp201/GetCertificateStatusResponse.json",
                ocpp201::GetCertificateStatusHandler {
                    certificate_validation: Arc::clone(&deps.certificate_validation),
                },
            ),
        ),
        (
            "SignCertificate",
            CallRoute::new(
                "ocpp201/SignCertificateRequest.json",
                "ocpp201/SignCertificateResponse.json",
                ocpp201::SignCertificateHandler {
                    certificate_signer: deps.certificate_signer.clone(),
                    call_maker,
                },
            ),
        ),
        (
            "Get15118EVCertificate",
            CallRoute::new(
                "ocpp201/Get15118EVCertificateRequest.json",
                "ocpp201/Get15118EVCertificateResponse.json",
                ocpp201::Get15118EvCertificateHandler {
                    ev_certificate_provider: deps.ev_certificate_provider.clone(),
                },
            ),
        ),
    ]);

    let call_result_routes = HashMap::from([(
        "CertificateSigned",
        CallResultRoute::new(
            "ocpp201/CertificateSignedRequest.json",
            "ocpp201/CertificateSignedResponse.json",
            ocpp201::CertificateSignedResultHandler,
        ),
    )]);

    Router::new(
        call_routes,
        call_result_routes,
        Arc::clone(&deps.schemas),
        Arc::clone(&deps.pending_call_store),
    )
}
