use crate::error::DomainResult;
use crate::handlers::convert_v16_meter_value;
use crate::routing::CallHandler;
use crate::store::{MeterValue, TransactionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use voltflow_ocpp::v16::{MeterValuesRequest, MeterValuesResponse};

pub struct MeterValuesHandler {
    pub transaction_store: Arc<dyn TransactionStore>,
}

#[async_trait]
impl CallHandler for MeterValuesHandler {
    type Request = MeterValuesRequest;
    type Response = MeterValuesResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let Some(transaction_id) = request.transaction_id else {
            // Readings outside a transaction are acknowledged but not kept.
            debug!(
                charge_station_id,
                connector_id = request.connector_id,
                "meter values without transaction"
            );
            return Ok(MeterValuesResponse {});
        };

        let meter_values: Vec<MeterValue> = request
            .meter_value
            .iter()
            .filter_map(convert_v16_meter_value)
            .collect();

        self.transaction_store
            .append_meter_values(charge_station_id, &transaction_id.to_string(), meter_values)
            .await?;

        Ok(MeterValuesResponse {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockTransactionStore;
    use voltflow_ocpp::v16;

    #[tokio::test]
    async fn appends_readings_to_transaction() {
        let mut transaction_store = MockTransactionStore::new();
        transaction_store
            .expect_append_meter_values()
            .withf(|cs: &str, id: &str, values: &Vec<MeterValue>| {
                cs == "cs001"
                    && id == "42"
                    && values.len() == 1
                    && values[0].sampled_values[0].value == 1500.0
            })
            .times(1)
            .return_once(|_, _, _| Ok(()));

        let handler = MeterValuesHandler {
            transaction_store: Arc::new(transaction_store),
        };

        handler
            .handle_call(
                "cs001",
                MeterValuesRequest {
                    connector_id: 1,
                    transaction_id: Some(42),
                    meter_value: vec![v16::MeterValue {
                        timestamp: "2023-06-15T15:30:00+01:00".to_string(),
                        sampled_value: vec![v16::SampledValue {
                            value: "1500".to_string(),
                            context: Some("Sample.Periodic".to_string()),
                            format: None,
                            measurand: Some("Energy.Active.Import.Register".to_string()),
                            phase: None,
                            location: None,
                            unit: Some("Wh".to_string()),
                        }],
                    }],
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn readings_without_transaction_are_dropped() {
        let mut transaction_store = MockTransactionStore::new();
        transaction_store.expect_append_meter_values().times(0);

        let handler = MeterValuesHandler {
            transaction_store: Arc::new(transaction_store),
        };

        handler
            .handle_call(
                "cs001",
                MeterValuesRequest {
                    connector_id: 1,
                    transaction_id: None,
                    meter_value: vec![],
                },
            )
            .await
            .unwrap();
    }
}
