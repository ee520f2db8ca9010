use crate::error::DomainResult;
use crate::routing::{CallHandler, CallMaker, OutgoingCall};
use crate::services::CertificateSignerService;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use voltflow_ocpp::error::OcppError;
use voltflow_ocpp::v201::{
    CertificateSignedRequest, GenericStatus, SignCertificateRequest, SignCertificateResponse,
};

/// Correlation state for a pending CertificateSigned call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignCertificateState {
    pub csr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
}

pub struct SignCertificateHandler {
    pub certificate_signer: Option<Arc<dyn CertificateSignerService>>,
    pub call_maker: Arc<dyn CallMaker>,
}

#[async_trait]
impl CallHandler for SignCertificateHandler {
    type Request = SignCertificateRequest;
    type Response = SignCertificateResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let Some(signer) = &self.certificate_signer else {
            info!(charge_station_id, "no certificate signer configured, rejecting csr");
            return Ok(SignCertificateResponse {
                status: GenericStatus::Rejected,
            });
        };

        let certificate_chain = signer.sign_certificate(&request.csr).await?;

        let state = serde_json::to_vec(&SignCertificateState {
            csr: request.csr.clone(),
            certificate_type: request.certificate_type.clone(),
        })
        .map_err(|e| OcppError::internal_error(format!("encoding sign certificate state: {e}")))?;

        self.call_maker
            .send(
                charge_station_id,
                OutgoingCall::new(
                    &CertificateSignedRequest {
                        certificate_chain,
                        certificate_type: request.certificate_type,
                    },
                    Some(state),
                )?,
            )
            .await?;

        Ok(SignCertificateResponse {
            status: GenericStatus::Accepted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MockCallMaker;
    use crate::services::MockCertificateSignerService;

    #[tokio::test]
    async fn forwards_csr_and_enqueues_certificate_signed() {
        let mut signer = MockCertificateSignerService::new();
        signer
            .expect_sign_certificate()
            .withf(|csr: &str| csr.contains("CERTIFICATE REQUEST"))
            .times(1)
            .return_once(|_| Ok("-----BEGIN CERTIFICATE-----\n...".to_string()));

        let mut call_maker = MockCallMaker::new();
        call_maker
            .expect_send()
            .withf(|cs: &str, call: &OutgoingCall| {
                cs == "cs001" && call.action == "CertificateSigned" && call.state.is_some()
            })
            .times(1)
            .return_once(|_, _| Ok(()));

        let handler = SignCertificateHandler {
            certificate_signer: Some(Arc::new(signer)),
            call_maker: Arc::new(call_maker),
        };

        let got = handler
            .handle_call(
                "cs001",
                SignCertificateRequest {
                    csr: "-----BEGIN CERTIFICATE REQUEST-----".to_string(),
                    certificate_type: Some("V2GCertificate".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(got.status, GenericStatus::Accepted);
    }

    #[tokio::test]
    async fn rejects_when_no_signer_configured() {
        let mut call_maker = MockCallMaker::new();
        call_maker.expect_send().times(0);

        let handler = SignCertificateHandler {
            certificate_signer: None,
            call_maker: Arc::new(call_maker),
        };

        let got = handler
            .handle_call(
                "cs001",
                SignCertificateRequest {
                    csr: "-----BEGIN CERTIFICATE REQUEST-----".to_string(),
                    certificate_type: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(got.status, GenericStatus::Rejected);
    }
}
