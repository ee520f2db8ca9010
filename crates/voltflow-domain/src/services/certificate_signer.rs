use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use base64::Engine;
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::{Decode, Encode};
use openssl::x509::X509;
use std::time::Duration;
use tracing::debug;

/// Signs charge-station and contract CSRs via an external CA.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CertificateSignerService: Send + Sync {
    /// Returns the signed certificate chain, PEM-encoded leaf first.
    async fn sign_certificate(&self, csr: &str) -> DomainResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoVersion {
    Iso15118V2,
    Iso15118V20,
}

impl IsoVersion {
    fn path_segment(self) -> &'static str {
        match self {
            IsoVersion::Iso15118V2 => "ISO15118-2",
            IsoVersion::Iso15118V20 => "ISO15118-20",
        }
    }
}

/// OPCP CPO signer: `POST {base}/cpo/simpleenroll/{iso}` with a bearer
/// token and the base64 DER CSR; the reply is a base64 PKCS7 envelope
/// holding the signed chain.
pub struct OpcpCpoCertificateSignerService {
    base_url: String,
    bearer_token: String,
    iso_version: IsoVersion,
    http_client: reqwest::Client,
}

const SIGNER_TIMEOUT: Duration = Duration::from_secs(10);

impl OpcpCpoCertificateSignerService {
    pub fn new(
        base_url: String,
        bearer_token: String,
        iso_version: IsoVersion,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url,
            bearer_token,
            iso_version,
            http_client,
        }
    }
}

#[async_trait]
impl CertificateSignerService for OpcpCpoCertificateSignerService {
    async fn sign_certificate(&self, csr: &str) -> DomainResult<String> {
        let url = format!(
            "{}/cpo/simpleenroll/{}",
            self.base_url.trim_end_matches('/'),
            self.iso_version.path_segment()
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .header("Content-Type", "application/pkcs10")
            .body(strip_pem_armor(csr))
            .timeout(SIGNER_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::upstream)?;
        if !response.status().is_success() {
            return Err(DomainError::upstream(anyhow::anyhow!(
                "certificate signer returned {}",
                response.status()
            )));
        }
        let body = response.text().await.map_err(DomainError::upstream)?;

        let chain = pkcs7_to_pem_chain(&body)?;
        debug!(url, "csr signed");
        Ok(chain)
    }
}

/// Reduce a PEM CSR to its base64 body; a bare base64 CSR passes through.
fn strip_pem_armor(csr: &str) -> String {
    csr.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("")
}

/// Decode a base64 PKCS7 SignedData envelope into a leaf-first PEM chain.
fn pkcs7_to_pem_chain(body: &str) -> DomainResult<String> {
    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    let der_bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| DomainError::upstream(anyhow::anyhow!("decoding pkcs7 base64: {e}")))?;

    let content_info = ContentInfo::from_der(&der_bytes)
        .map_err(|e| DomainError::upstream(anyhow::anyhow!("parsing pkcs7: {e}")))?;
    let signed_data: SignedData = content_info
        .content
        .decode_as()
        .map_err(|e| DomainError::upstream(anyhow::anyhow!("parsing pkcs7 signed data: {e}")))?;
    let certificate_set = signed_data
        .certificates
        .ok_or_else(|| DomainError::upstream(anyhow::anyhow!("pkcs7 contains no certificates")))?;

    let mut certificates = Vec::new();
    for choice in certificate_set.0.iter() {
        if let CertificateChoices::Certificate(certificate) = choice {
            let der = certificate
                .to_der()
                .map_err(|e| DomainError::upstream(anyhow::anyhow!("re-encoding certificate: {e}")))?;
            certificates.push(
                X509::from_der(&der)
                    .map_err(|e| DomainError::upstream(anyhow::anyhow!("parsing certificate: {e}")))?,
            );
        }
    }
    if certificates.is_empty() {
        return Err(DomainError::upstream(anyhow::anyhow!(
            "pkcs7 contains no certificates"
        )));
    }

    let ordered = order_leaf_first(certificates)?;
    let mut pem = String::new();
    for certificate in &ordered {
        let block = certificate
            .to_pem()
            .map_err(|e| DomainError::upstream(anyhow::anyhow!("encoding certificate: {e}")))?;
        pem.push_str(&String::from_utf8_lossy(&block));
    }
    Ok(pem)
}

/// Order certificates so that each one is followed by its issuer. The leaf
/// is the certificate that issued nothing else in the set. Falls back to
/// the original order when the set does not form a single path.
fn order_leaf_first(certificates: Vec<X509>) -> DomainResult<Vec<X509>> {
    if certificates.len() <= 1 {
        return Ok(certificates);
    }

    let name_der = |name: &openssl::x509::X509NameRef| name.to_der().ok();
    let subjects: Vec<_> = certificates
        .iter()
        .map(|c| name_der(c.subject_name()))
        .collect();
    let issuers: Vec<_> = certificates
        .iter()
        .map(|c| name_der(c.issuer_name()))
        .collect();

    let leaf_index = (0..certificates.len()).find(|&candidate| {
        !issuers
            .iter()
            .enumerate()
            .any(|(other, issuer)| other != candidate && *issuer == subjects[candidate])
    });
    let Some(mut current) = leaf_index else {
        return Ok(certificates);
    };

    let mut ordered_indices = vec![current];
    while ordered_indices.len() < certificates.len() {
        let next = (0..certificates.len()).find(|&candidate| {
            !ordered_indices.contains(&candidate) && subjects[candidate] == issuers[current]
        });
        match next {
            Some(index) => {
                ordered_indices.push(index);
                current = index;
            }
            None => break,
        }
    }

    if ordered_indices.len() != certificates.len() {
        return Ok(certificates);
    }

    let mut by_index: Vec<Option<X509>> = certificates.into_iter().map(Some).collect();
    Ok(ordered_indices
        .into_iter()
        .filter_map(|index| by_index[index].take())
        .collect())
}
