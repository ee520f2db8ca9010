use crate::error::DomainResult;
use crate::handlers::{energy_register_reading, parse_timestamp};
use crate::routing::CallHandler;
use crate::store::{TokenStore, Transaction, TransactionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use voltflow_ocpp::v16::{
    AuthorizationStatus, IdTagInfo, StartTransactionRequest, StartTransactionResponse,
};

pub struct StartTransactionHandler {
    pub token_store: Arc<dyn TokenStore>,
    pub transaction_store: Arc<dyn TransactionStore>,
}

#[async_trait]
impl CallHandler for StartTransactionHandler {
    type Request = StartTransactionRequest;
    type Response = StartTransactionResponse;

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

        let started_at = parse_timestamp(&request.timestamp)?;
        // 1.6 transaction ids are CSMS-assigned integers; deriving them from
        // the start timestamp keeps redelivered StartTransactions on the
        // same id.
        let transaction_id = (started_at.timestamp() & i64::from(i32::MAX)) as i32;

        self.transaction_store
            .create_transaction(Transaction {
                charge_station_id: charge_station_id.to_string(),
                transaction_id: transaction_id.to_string(),
                id_token: request.id_tag.clone(),
                token_type: "ISO14443".to_string(),
                meter_values: vec![energy_register_reading(
                    started_at,
                    f64::from(request.meter_start),
                    "Transaction.Begin",
                )],
                started_at,
                stopped_at: None,
                offline: false,
                total_cost: None,
            })
            .await?;

        info!(
            charge_station_id,
            transaction_id,
            id_tag = %request.id_tag,
            connector_id = request.connector_id,
            status = ?status,
            "transaction started"
        );

        Ok(StartTransactionResponse {
            id_tag_info: IdTagInfo::with_status(status),
            transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CacheMode, MockTokenStore, MockTransactionStore, Token};

    fn request() -> StartTransactionRequest {
        StartTransactionRequest {
            connector_id: 1,
            id_tag: "ABC123".to_string(),
            meter_start: 100,
            reservation_id: None,
            timestamp: "2023-06-15T15:05:00+01:00".to_string(),
        }
    }

    #[tokio::test]
    async fn opens_transaction_with_start_reading() {
        let mut token_store = MockTokenStore::new();
        token_store.expect_find_token().return_once(|_, _| {
            Ok(Some(Token {
                token_type: "ISO14443".to_string(),
                token_id: "ABC123".to_string(),
                issuer: "voltflow".to_string(),
                cache_mode: CacheMode::Always,
                contract_id: None,
            }))
        });

        let mut transaction_store = MockTransactionStore::new();
        transaction_store
            .expect_create_transaction()
            .withf(|transaction: &Transaction| {
                transaction.charge_station_id == "cs001"
                    && transaction.id_token == "ABC123"
                    && transaction.meter_values.len() == 1
                    && transaction.meter_values[0].sampled_values[0].value == 100.0
            })
            .times(1)
            .return_once(|_| Ok(()));

        let handler = StartTransactionHandler {
            token_store: Arc::new(token_store),
            transaction_store: Arc::new(transaction_store),
        };

        let got = handler.handle_call("cs001", request()).await.unwrap();
        assert_eq!(got.id_tag_info.status, AuthorizationStatus::Accepted);
        assert!(got.transaction_id > 0);
    }

    #[tokio::test]
    async fn unknown_token_still_opens_transaction_as_invalid() {
        let mut token_store = MockTokenStore::new();
        token_store.expect_find_token().return_once(|_, _| Ok(None));

        let mut transaction_store = MockTransactionStore::new();
        transaction_store
            .expect_create_transaction()
            .times(1)
            .return_once(|_| Ok(()));

        let handler = StartTransactionHandler {
            token_store: Arc::new(token_store),
            transaction_store: Arc::new(transaction_store),
        };

        let got = handler.handle_call("cs001", request()).await.unwrap();
        assert_eq!(got.id_tag_info.status, AuthorizationStatus::Invalid);
    }
}
