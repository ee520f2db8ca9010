use crate::error::CertificateValidationError;
use crate::services::ocsp::encode_ocsp_request;
use async_trait::async_trait;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::ocsp::{OcspCertId, OcspCertStatus, OcspRequest, OcspResponse, OcspResponseStatus};
use openssl::stack::Stack;
use openssl::x509::store::{X509Store, X509StoreBuilder};
use openssl::x509::{X509Ref, X509StoreContext, X509};
use std::time::Duration;
use tracing::{debug, warn};
use voltflow_ocpp::v201::OcspRequestData;

type CertResult<T> = Result<T, CertificateValidationError>;

/// Validates contract-certificate chains against the configured trust
/// anchors and queries OCSP responders per RFC 6960.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CertificateValidationService: Send + Sync {
    /// Validate an ordered PEM chain (leaf first). When `emaid` is non-empty
    /// the leaf CN must match it. Returns the leaf certificate in DER form.
    async fn validate_pem_certificate_chain(&self, pem: &[u8], emaid: &str) -> CertResult<Vec<u8>>;

    /// Query the responder named in pre-hashed certificate data and return
    /// the base64-encoded DER OCSP response.
    async fn fetch_ocsp_status(&self, request: &OcspRequestData) -> CertResult<String>;
}

/// Production implementation. Stateless apart from the configured roots;
/// safe to share across workers.
pub struct OnlineCertificateValidationService {
    root_certificates: Vec<X509>,
    max_ocsp_attempts: u32,
    http_client: reqwest::Client,
}

const OCSP_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
const OCSP_BACKOFF_BASE: Duration = Duration::from_millis(500);
const OID_AD_OCSP: &str = "1.3.6.1.5.5.7.48.1";

impl OnlineCertificateValidationService {
    pub fn new(
        root_certificates: Vec<X509>,
        max_ocsp_attempts: u32,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            root_certificates,
            max_ocsp_attempts,
            http_client,
        }
    }

    fn trust_store(&self) -> CertResult<X509Store> {
        let mut builder = X509StoreBuilder::new().map_err(x509_error)?;
        for root in &self.root_certificates {
            builder.add_cert(root.clone()).map_err(x509_error)?;
        }
        Ok(builder.build())
    }

    /// Build a verified path from the leaf to one of the configured roots
    /// and return it leaf-first.
    fn verify_chain(&self, chain: &[X509]) -> CertResult<Vec<X509>> {
        let store = self.trust_store()?;
        let leaf = &chain[0];
        let mut intermediates = Stack::new().map_err(x509_error)?;
        for certificate in &chain[1..] {
            intermediates.push(certificate.clone()).map_err(x509_error)?;
        }

        let mut context = X509StoreContext::new().map_err(x509_error)?;
        let (valid, error, verified_chain) = context
            .init(&store, leaf, &intermediates, |ctx| {
                let valid = ctx.verify_cert()?;
                let verified_chain = ctx
                    .chain()
                    .map(|stack| stack.iter().map(X509Ref::to_owned).collect::<Vec<_>>());
                Ok((valid, ctx.error(), verified_chain))
            })
            .map_err(x509_error)?;

        if !valid {
            return Err(CertificateValidationError::UntrustedChain(
                error.error_string().to_string(),
            ));
        }
        verified_chain.ok_or_else(|| {
            CertificateValidationError::UntrustedChain("no verified chain produced".to_string())
        })
    }

    async fn check_ocsp_status(&self, certificate: &X509Ref, issuer: &X509Ref) -> CertResult<()> {
        let Some(responder_url) = ocsp_responder_url(certificate)? else {
            // Contract sub-CAs are not required to publish a responder; the
            // status stays unknown rather than failing the chain.
            warn!(
                subject = common_name(certificate).unwrap_or_default(),
                "certificate has no OCSP responder, skipping revocation check"
            );
            return Ok(());
        };

        let cert_id =
            OcspCertId::from_cert(MessageDigest::sha1(), certificate, issuer).map_err(x509_error)?;
        let mut ocsp_request = OcspRequest::new().map_err(x509_error)?;
        ocsp_request.add_id(cert_id).map_err(x509_error)?;
        let request_der = ocsp_request.to_der().map_err(x509_error)?;

        let response_der = self.post_ocsp(&responder_url, request_der).await?;
        let response = OcspResponse::from_der(&response_der).map_err(x509_error)?;
        if response.status() != OcspResponseStatus::SUCCESSFUL {
            return Err(CertificateValidationError::OcspUnavailable {
                attempts: self.max_ocsp_attempts,
            });
        }

        let basic = response.basic().map_err(x509_error)?;
        let status_id =
            OcspCertId::from_cert(MessageDigest::sha1(), certificate, issuer).map_err(x509_error)?;
        match basic.find_status(&status_id) {
            Some(status) if status.status == OcspCertStatus::REVOKED => {
                Err(CertificateValidationError::CertificateRevoked {
                    serial: serial_hex(certificate)?,
                })
            }
            Some(status) => {
                debug!(
                    subject = common_name(certificate).unwrap_or_default(),
                    good = (status.status == OcspCertStatus::GOOD),
                    "ocsp status checked"
                );
                Ok(())
            }
            None => Err(CertificateValidationError::OcspUnavailable {
                attempts: self.max_ocsp_attempts,
            }),
        }
    }

    /// POST the request with bounded retries and exponential backoff.
    async fn post_ocsp(&self, responder_url: &str, request_der: Vec<u8>) -> CertResult<Vec<u8>> {
        let mut backoff = OCSP_BACKOFF_BASE;
        for attempt in 1..=self.max_ocsp_attempts {
            let result = self
                .http_client
                .post(responder_url)
                .header("Content-Type", "application/ocsp-request")
                .body(request_der.clone())
                .timeout(OCSP_ATTEMPT_TIMEOUT)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return response.bytes().await.map(|bytes| bytes.to_vec()).map_err(|e| {
                        CertificateValidationError::X509(format!("reading ocsp response: {e}"))
                    });
                }
                Ok(response) => {
                    warn!(responder_url, attempt, status = %response.status(), "ocsp responder returned error");
                }
                Err(e) => {
                    warn!(responder_url, attempt, error = %e, "ocsp request failed");
                }
            }
            if attempt < self.max_ocsp_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
        Err(CertificateValidationError::OcspUnavailable {
            attempts: self.max_ocsp_attempts,
        })
    }
}

#[async_trait]
impl CertificateValidationService for OnlineCertificateValidationService {
    async fn validate_pem_certificate_chain(&self, pem: &[u8], emaid: &str) -> CertResult<Vec<u8>> {
        // Anything that yields no CERTIFICATE blocks, malformed PEM
        // included, is an empty chain.
        let chain = X509::stack_from_pem(pem).unwrap_or_default();
        if chain.is_empty() {
            return Err(CertificateValidationError::EmptyChain);
        }
        let leaf = &chain[0];

        if !emaid.is_empty() {
            let actual = common_name(leaf)?.unwrap_or_default();
            if !actual.eq_ignore_ascii_case(emaid) {
                return Err(CertificateValidationError::SubjectMismatch {
                    expected: emaid.to_string(),
                    actual,
                });
            }
        }

        let verified_chain = self.verify_chain(&chain)?;

        // Leaf-first path; the last element is the trust anchor, which is
        // exempt from OCSP.
        for pair in verified_chain.windows(2) {
            self.check_ocsp_status(&pair[0], &pair[1]).await?;
        }

        leaf.to_der().map_err(x509_error)
    }

    async fn fetch_ocsp_status(&self, request: &OcspRequestData) -> CertResult<String> {
        let issuer_name_hash = decode_hex("issuerNameHash", &request.issuer_name_hash)?;
        let issuer_key_hash = decode_hex("issuerKeyHash", &request.issuer_key_hash)?;
        let serial_number = decode_hex("serialNumber", &request.serial_number)?;

        let request_der = encode_ocsp_request(
            request.hash_algorithm,
            &issuer_name_hash,
            &issuer_key_hash,
            &serial_number,
        );
        let response_der = self.post_ocsp(&request.responder_url, request_der).await?;

        let response = OcspResponse::from_der(&response_der).map_err(x509_error)?;
        if response.status() != OcspResponseStatus::SUCCESSFUL {
            return Err(CertificateValidationError::OcspUnavailable {
                attempts: self.max_ocsp_attempts,
            });
        }
        Ok(base64::engine::general_purpose::STANDARD.encode(&response_der))
    }
}

fn x509_error(err: impl std::fmt::Display) -> CertificateValidationError {
    CertificateValidationError::X509(err.to_string())
}

fn common_name(certificate: &X509Ref) -> CertResult<Option<String>> {
    Ok(certificate
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string()))
}

fn serial_hex(certificate: &X509Ref) -> CertResult<String> {
    let serial = certificate
        .serial_number()
        .to_bn()
        .and_then(|bn| bn.to_hex_str().map(|s| s.to_string()))
        .map_err(x509_error)?;
    Ok(serial.to_lowercase())
}

fn decode_hex(field: &str, value: &str) -> CertResult<Vec<u8>> {
    let normalized = if value.len() % 2 == 1 {
        format!("0{value}")
    } else {
        value.to_string()
    };
    hex::decode(normalized)
        .map_err(|e| CertificateValidationError::X509(format!("decoding {field}: {e}")))
}

/// OCSP responder URI from the Authority Information Access extension.
fn ocsp_responder_url(certificate: &X509Ref) -> CertResult<Option<String>> {
    let der = certificate.to_der().map_err(x509_error)?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|e| CertificateValidationError::X509(format!("parsing certificate: {e}")))?;

    for extension in parsed.extensions() {
        if let x509_parser::extensions::ParsedExtension::AuthorityInfoAccess(aia) =
            extension.parsed_extension()
        {
            for descriptor in &aia.accessdescs {
                if descriptor.access_method.to_id_string() != OID_AD_OCSP {
                    continue;
                }
                if let x509_parser::extensions::GeneralName::URI(uri) = &descriptor.access_location
                {
                    return Ok(Some(uri.to_string()));
                }
            }
        }
    }
    Ok(None)
}
