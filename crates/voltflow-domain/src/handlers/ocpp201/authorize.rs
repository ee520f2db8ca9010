use crate::error::{CertificateValidationError, DomainResult};
use crate::routing::CallHandler;
use crate::services::CertificateValidationService;
use crate::store::TokenStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use voltflow_ocpp::v201::{
    AuthorizationStatus, AuthorizeCertificateStatus, AuthorizeRequest, AuthorizeResponse,
    IdTokenInfo,
};

pub struct AuthorizeHandler {
    pub token_store: Arc<dyn TokenStore>,
    pub certificate_validation: Option<Arc<dyn CertificateValidationService>>,
}

#[async_trait]
impl CallHandler for AuthorizeHandler {
    type Request = AuthorizeRequest;
    type Response = AuthorizeResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let token = self
            .token_store
            .find_token(&request.id_token.token_type, &request.id_token.id_token)
            .await?;
        let status = if token.is_some() {
            AuthorizationStatus::Accepted
        } else {
            AuthorizationStatus::Unknown
        };

        let certificate_status = match &self.certificate_validation {
            Some(service) => {
                derive_certificate_status(service.as_ref(), &request, charge_station_id).await?
            }
            None => None,
        };

        info!(
            charge_station_id,
            id_token = %request.id_token.id_token,
            token_type = %request.id_token.token_type,
            status = ?status,
            certificate_status = ?certificate_status,
            "authorize"
        );

        Ok(AuthorizeResponse {
            id_token_info: IdTokenInfo::with_status(status),
            certificate_status,
        })
    }
}

/// Derive the contract-certificate status when the request carries either a
/// full PEM chain or pre-hashed OCSP data.
async fn derive_certificate_status(
    service: &dyn CertificateValidationService,
    request: &AuthorizeRequest,
    charge_station_id: &str,
) -> DomainResult<Option<AuthorizeCertificateStatus>> {
    if let Some(certificate) = &request.certificate {
        let emaid = &request.id_token.id_token;
        return match service
            .validate_pem_certificate_chain(certificate.as_bytes(), emaid)
            .await
        {
            Ok(_) => Ok(Some(AuthorizeCertificateStatus::Accepted)),
            Err(err) => {
                warn!(charge_station_id, error = %err, "contract certificate rejected");
                Ok(Some(map_validation_error(&err)))
            }
        };
    }

    if let Some(hash_data) = &request.iso15118_certificate_hash_data {
        for entry in hash_data {
            if let Err(err) = service.fetch_ocsp_status(entry).await {
                warn!(charge_station_id, error = %err, "ocsp lookup for hashed certificate failed");
                return Ok(Some(map_validation_error(&err)));
            }
        }
        return Ok(Some(AuthorizeCertificateStatus::Accepted));
    }

    Ok(None)
}

fn map_validation_error(err: &CertificateValidationError) -> AuthorizeCertificateStatus {
    match err {
        CertificateValidationError::CertificateRevoked { .. } => {
            AuthorizeCertificateStatus::CertificateRevoked
        }
        CertificateValidationError::UntrustedChain(_)
        | CertificateValidationError::SubjectMismatch { .. } => {
            AuthorizeCertificateStatus::CertChainError
        }
        CertificateValidationError::OcspUnavailable { .. }
        | CertificateValidationError::EmptyChain
        | CertificateValidationError::X509(_) => {
            AuthorizeCertificateStatus::NoCertificateAvailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MockCertificateValidationService;
    use crate::store::{CacheMode, MockTokenStore, Token};
    use voltflow_ocpp::v201::IdToken;

    fn emaid_token() -> Token {
        Token {
            token_type: "eMAID".to_string(),
            token_id: "EMP77TWTW99999".to_string(),
            issuer: "voltflow".to_string(),
            cache_mode: CacheMode::Always,
            contract_id: None,
        }
    }

    fn request(certificate: Option<String>) -> AuthorizeRequest {
        AuthorizeRequest {
            id_token: IdToken {
                id_token: "EMP77TWTW99999".to_string(),
                token_type: "eMAID".to_string(),
            },
            certificate,
            iso15118_certificate_hash_data: None,
        }
    }

    #[tokio::test]
    async fn token_only_authorize_does_not_touch_certificates() {
        let mut token_store = MockTokenStore::new();
        token_store
            .expect_find_token()
            .return_once(|_, _| Ok(Some(emaid_token())));
        let mut validation = MockCertificateValidationService::new();
        validation.expect_validate_pem_certificate_chain().times(0);

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
            certificate_validation: Some(Arc::new(validation)),
        };
        let got = handler.handle_call("cs001", request(None)).await.unwrap();

        assert_eq!(got.id_token_info.status, AuthorizationStatus::Accepted);
        assert!(got.certificate_status.is_none());
    }

    #[tokio::test]
    async fn valid_contract_certificate_is_accepted() {
        let mut token_store = MockTokenStore::new();
        token_store
            .expect_find_token()
            .return_once(|_, _| Ok(Some(emaid_token())));
        let mut validation = MockCertificateValidationService::new();
        validation
            .expect_validate_pem_certificate_chain()
            .withf(|_pem: &[u8], emaid: &str| emaid == "EMP77TWTW99999")
            .times(1)
            .return_once(|_, _| Ok(vec![0x30]));

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
            certificate_validation: Some(Arc::new(validation)),
        };
        let got = handler
            .handle_call("cs001", request(Some("-----BEGIN CERTIFICATE-----".to_string())))
            .await
            .unwrap();

        assert_eq!(
            got.certificate_status,
            Some(AuthorizeCertificateStatus::Accepted)
        );
    }

    #[tokio::test]
    async fn revoked_certificate_maps_to_certificate_revoked() {
        let mut token_store = MockTokenStore::new();
        token_store
            .expect_find_token()
            .return_once(|_, _| Ok(Some(emaid_token())));
        let mut validation = MockCertificateValidationService::new();
        validation
            .expect_validate_pem_certificate_chain()
            .return_once(|_, _| {
                Err(CertificateValidationError::CertificateRevoked {
                    serial: "0badc0de".to_string(),
                })
            });

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
            certificate_validation: Some(Arc::new(validation)),
        };
        let got = handler
            .handle_call("cs001", request(Some("-----BEGIN CERTIFICATE-----".to_string())))
            .await
            .unwrap();

        assert_eq!(
            got.certificate_status,
            Some(AuthorizeCertificateStatus::CertificateRevoked)
        );
    }

    #[tokio::test]
    async fn unknown_token_is_unknown() {
        let mut token_store = MockTokenStore::new();
        token_store.expect_find_token().return_once(|_, _| Ok(None));

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
            certificate_validation: None,
        };
        let got = handler.handle_call("cs001", request(None)).await.unwrap();

        assert_eq!(got.id_token_info.status, AuthorizationStatus::Unknown);
    }
}
