use crate::error::DomainResult;
use crate::routing::CallHandler;
use crate::services::CertificateValidationService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use voltflow_ocpp::v201::{
    GetCertificateStatusRequest, GetCertificateStatusResponse, GetCertificateStatusStatus,
};

pub struct GetCertificateStatusHandler {
    pub certificate_validation: Arc<dyn CertificateValidationService>,
}

#[async_trait]
impl CallHandler for GetCertificateStatusHandler {
    type Request = GetCertificateStatusRequest;
    type Response = GetCertificateStatusResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        match self
            .certificate_validation
            .fetch_ocsp_status(&request.ocsp_request_data)
            .await
        {
            Ok(ocsp_result) => Ok(GetCertificateStatusResponse {
                status: GetCertificateStatusStatus::Accepted,
                ocsp_result: Some(ocsp_result),
            }),
            Err(err) => {
                warn!(
                    charge_station_id,
                    responder_url = %request.ocsp_request_data.responder_url,
                    error = %err,
                    "ocsp status fetch failed"
                );
                Ok(GetCertificateStatusResponse {
                    status: GetCertificateStatusStatus::Failed,
                    ocsp_result: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CertificateValidationError;
    use crate::services::MockCertificateValidationService;
    use voltflow_ocpp::v201::{HashAlgorithm, OcspRequestData};

    fn request() -> GetCertificateStatusRequest {
        GetCertificateStatusRequest {
            ocsp_request_data: OcspRequestData {
                hash_algorithm: HashAlgorithm::Sha256,
                issuer_name_hash: "aa".repeat(32),
                issuer_key_hash: "bb".repeat(32),
                serial_number: "0badc0de".to_string(),
                responder_url: "https://ocsp.example.com".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn successful_lookup_returns_ocsp_result() {
        let mut validation = MockCertificateValidationService::new();
        validation
            .expect_fetch_ocsp_status()
            .times(1)
            .return_once(|_| Ok("b2NzcA==".to_string()));

        let handler = GetCertificateStatusHandler {
            certificate_validation: Arc::new(validation),
        };
        let got = handler.handle_call("cs001", request()).await.unwrap();

        assert_eq!(got.status, GetCertificateStatusStatus::Accepted);
        assert_eq!(got.ocsp_result.as_deref(), Some("b2NzcA=="));
    }

    #[tokio::test]
    async fn responder_failure_is_a_failed_status_not_an_error() {
        let mut validation = MockCertificateValidationService::new();
        validation
            .expect_fetch_ocsp_status()
            .times(1)
            .return_once(|_| Err(CertificateValidationError::OcspUnavailable { attempts: 3 }));

        let handler = GetCertificateStatusHandler {
            certificate_validation: Arc::new(validation),
        };
        let got = handler.handle_call("cs001", request()).await.unwrap();

        assert_eq!(got.status, GetCertificateStatusStatus::Failed);
        assert!(got.ocsp_result.is_none());
    }
}
