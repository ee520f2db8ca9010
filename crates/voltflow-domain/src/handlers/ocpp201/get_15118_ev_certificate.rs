use crate::error::DomainResult;
use crate::routing::CallHandler;
use crate::services::EvCertificateProvider;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use voltflow_ocpp::v201::{
    Get15118EVCertificateRequest, Get15118EVCertificateResponse, Iso15118EVCertificateStatus,
};

pub struct Get15118EvCertificateHandler {
    pub ev_certificate_provider: Option<Arc<dyn EvCertificateProvider>>,
}

#[async_trait]
impl CallHandler for Get15118EvCertificateHandler {
    type Request = Get15118EVCertificateRequest;
    type Response = Get15118EVCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let Some(provider) = &self.ev_certificate_provider else {
            warn!(charge_station_id, "no ev certificate provider configured");
            return Ok(Get15118EVCertificateResponse {
                status: Iso15118EVCertificateStatus::Failed,
                exi_response: String::new(),
            });
        };

        match provider
            .provide_certificate(
                request.action,
                &request.exi_request,
                &request.iso15118_schema_version,
            )
            .await
        {
            Ok(exi_response) => {
                info!(
                    charge_station_id,
                    action = ?request.action,
                    schema_version = %request.iso15118_schema_version,
                    "contract certificate provided"
                );
                Ok(Get15118EVCertificateResponse {
                    status: Iso15118EVCertificateStatus::Accepted,
                    exi_response,
                })
            }
            Err(err) => {
                warn!(charge_station_id, error = %err, "contract certificate provisioning failed");
                Ok(Get15118EVCertificateResponse {
                    status: Iso15118EVCertificateStatus::Failed,
                    exi_response: String::new(),
                })
            }
        }
    }
}
