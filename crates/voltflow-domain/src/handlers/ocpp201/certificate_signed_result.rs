use crate::error::DomainResult;
use crate::handlers::ocpp201::SignCertificateState;
use crate::routing::CallResultHandler;
use async_trait::async_trait;
use tracing::{info, warn};
use voltflow_ocpp::v201::{
    CertificateSignedRequest, CertificateSignedResponse, CertificateSignedStatus,
};

/// Terminal step of the certificate signing flow: the station confirms (or
/// refuses) installation of the chain we pushed.
pub struct CertificateSignedResultHandler;

#[async_trait]
impl CallResultHandler for CertificateSignedResultHandler {
    type Request = CertificateSignedRequest;
    type Response = CertificateSignedResponse;

    async fn handle_call_result(
        &self,
        charge_station_id: &str,
        _request: Self::Request,
        response: Self::Response,
        state: Option<&[u8]>,
    ) -> DomainResult<()> {
        let pending: Option<SignCertificateState> =
            state.and_then(|bytes| serde_json::from_slice(bytes).ok());
        let certificate_type = pending
            .as_ref()
            .and_then(|p| p.certificate_type.as_deref())
            .unwrap_or("unknown");

        match response.status {
            CertificateSignedStatus::Accepted => {
                info!(charge_station_id, certificate_type, "certificate installed");
            }
            CertificateSignedStatus::Rejected => {
                warn!(charge_station_id, certificate_type, "certificate rejected by station");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accepts_result_with_and_without_state() {
        let handler = CertificateSignedResultHandler;
        let request = CertificateSignedRequest {
            certificate_chain: "-----BEGIN CERTIFICATE-----".to_string(),
            certificate_type: None,
        };
        let response = CertificateSignedResponse {
            status: CertificateSignedStatus::Accepted,
        };

        handler
            .handle_call_result("cs001", request.clone(), response.clone(), None)
            .await
            .unwrap();

        let state = serde_json::to_vec(&SignCertificateState {
            csr: "-----BEGIN CERTIFICATE REQUEST-----".to_string(),
            certificate_type: Some("V2GCertificate".to_string()),
        })
        .unwrap();
        handler
            .handle_call_result("cs001", request, response, Some(&state))
            .await
            .unwrap();
    }
}
