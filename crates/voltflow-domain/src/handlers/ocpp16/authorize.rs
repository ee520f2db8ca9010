use crate::error::DomainResult;
use crate::routing::CallHandler;
use crate::store::TokenStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use voltflow_ocpp::v16::{AuthorizationStatus, AuthorizeRequest, AuthorizeResponse, IdTagInfo};

pub struct AuthorizeHandler {
    pub token_store: Arc<dyn TokenStore>,
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
            .find_token("ISO14443", &request.id_tag)
            .await?;
        let status = if token.is_some() {
            AuthorizationStatus::Accepted
        } else {
            AuthorizationStatus::Invalid
        };
        info!(charge_station_id, id_tag = %request.id_tag, status = ?status, "authorize");

        Ok(AuthorizeResponse {
            id_tag_info: IdTagInfo::with_status(status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CacheMode, MockTokenStore, Token};

    #[tokio::test]
    async fn known_token_is_accepted() {
        let mut token_store = MockTokenStore::new();
        token_store
            .expect_find_token()
            .withf(|token_type: &str, token_id: &str| {
                token_type == "ISO14443" && token_id == "ABC123"
            })
            .times(1)
            .return_once(|_, _| {
                Ok(Some(Token {
                    token_type: "ISO14443".to_string(),
                    token_id: "ABC123".to_string(),
                    issuer: "voltflow".to_string(),
                    cache_mode: CacheMode::Always,
                    contract_id: None,
                }))
            });

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
        };
        let got = handler
            .handle_call(
                "cs001",
                AuthorizeRequest {
                    id_tag: "ABC123".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(got.id_tag_info.status, AuthorizationStatus::Accepted);
    }

    #[tokio::test]
    async fn unknown_token_is_invalid() {
        let mut token_store = MockTokenStore::new();
        token_store
            .expect_find_token()
            .times(1)
            .return_once(|_, _| Ok(None));

        let handler = AuthorizeHandler {
            token_store: Arc::new(token_store),
        };
        let got = handler
            .handle_call(
                "cs001",
                AuthorizeRequest {
                    id_tag: "ABC123".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(got.id_tag_info.status, AuthorizationStatus::Invalid);
    }
}
