use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use voltflow_ocpp::v201::CertificateAction;

/// Provides signed ISO 15118 contract data (exi-encoded) for an EV.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EvCertificateProvider: Send + Sync {
    async fn provide_certificate(
        &self,
        action: CertificateAction,
        exi_request: &str,
        schema_version: &str,
    ) -> DomainResult<String>;
}

/// OPCP MO provider: `POST {base}/mo/signedContractData` forwards the exi
/// request and returns the signed contract data verbatim.
pub struct OpcpMoEvCertificateProvider {
    base_url: String,
    bearer_token: String,
    http_client: reqwest::Client,
}

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SignedContractDataRequest<'a> {
    #[serde(rename = "certificateInstallationReq")]
    certificate_installation_req: &'a str,
    #[serde(rename = "xsdMsgDefNamespace")]
    xsd_msg_def_namespace: &'a str,
}

#[derive(Deserialize)]
struct SignedContractDataResponse {
    #[serde(rename = "CCPResponse")]
    ccp_response: CcpResponse,
}

#[derive(Deserialize)]
struct CcpResponse {
    #[serde(rename = "emaidContent", default)]
    emaid_content: Vec<EmaidContent>,
}

#[derive(Deserialize)]
struct EmaidContent {
    #[serde(rename = "messageDef")]
    message_def: MessageDef,
}

#[derive(Deserialize)]
struct MessageDef {
    #[serde(rename = "certificateInstallationRes")]
    certificate_installation_res: Option<String>,
    #[serde(rename = "emaid")]
    emaid: Option<String>,
}

impl OpcpMoEvCertificateProvider {
    pub fn new(base_url: String, bearer_token: String, http_client: reqwest::Client) -> Self {
        Self {
            base_url,
            bearer_token,
            http_client,
        }
    }
}

#[async_trait]
impl EvCertificateProvider for OpcpMoEvCertificateProvider {
    async fn provide_certificate(
        &self,
        action: CertificateAction,
        exi_request: &str,
        schema_version: &str,
    ) -> DomainResult<String> {
        let url = format!(
            "{}/mo/signedContractData",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.bearer_token)
            .json(&SignedContractDataRequest {
                certificate_installation_req: exi_request,
                xsd_msg_def_namespace: schema_version,
            })
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::upstream)?;
        if !response.status().is_success() {
            return Err(DomainError::upstream(anyhow::anyhow!(
                "ev certificate provider returned {}",
                response.status()
            )));
        }

        let body: SignedContractDataResponse =
            response.json().await.map_err(DomainError::upstream)?;
        for content in body.ccp_response.emaid_content {
            if let Some(exi_response) = content.message_def.certificate_installation_res {
                debug!(
                    action = ?action,
                    emaid = content.message_def.emaid.as_deref().unwrap_or(""),
                    "signed contract data retrieved"
                );
                return Ok(exi_response);
            }
        }
        Err(DomainError::upstream(anyhow::anyhow!(
            "signed contract data response contains no certificateInstallationRes"
        )))
    }
}
