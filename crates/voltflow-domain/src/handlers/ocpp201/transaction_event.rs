use crate::error::DomainResult;
use crate::handlers::parse_timestamp;
use crate::routing::CallHandler;
use crate::services::TariffService;
use crate::store::{self, TokenStore, Transaction, TransactionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use voltflow_ocpp::v201::{
    AuthorizationStatus, IdTokenInfo, TransactionEventRequest, TransactionEventResponse,
    TransactionEventType,
};

pub struct TransactionEventHandler {
    pub token_store: Arc<dyn TokenStore>,
    pub transaction_store: Arc<dyn TransactionStore>,
    pub tariff_service: Arc<dyn TariffService>,
}

#[async_trait]
impl CallHandler for TransactionEventHandler {
    type Request = TransactionEventRequest;
    type Response = TransactionEventResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let transaction_id = request.transaction_info.transaction_id.clone();
        let timestamp = parse_timestamp(&request.timestamp)?;
        let meter_values = convert_meter_values(&request);

        let id_token_info = match &request.id_token {
            Some(id_token) => {
                let token = self
                    .token_store
                    .find_token(&id_token.token_type, &id_token.id_token)
                    .await?;
                let status = if token.is_some() {
                    AuthorizationStatus::Accepted
                } else {
                    AuthorizationStatus::Unknown
                };
                Some(IdTokenInfo::with_status(status))
            }
            None => None,
        };

        let mut total_cost = None;
        match request.event_type {
            TransactionEventType::Started => {
                let (id_token, token_type) = request
                    .id_token
                    .as_ref()
                    .map(|t| (t.id_token.clone(), t.token_type.clone()))
                    .unwrap_or_default();
                self.transaction_store
                    .create_transaction(Transaction {
                        charge_station_id: charge_station_id.to_string(),
                        transaction_id: transaction_id.clone(),
                        id_token,
                        token_type,
                        meter_values,
                        started_at: timestamp,
                        stopped_at: None,
                        offline: request.offline.unwrap_or(false),
                        total_cost: None,
                    })
                    .await?;
            }
            TransactionEventType::Updated => {
                self.transaction_store
                    .append_meter_values(charge_station_id, &transaction_id, meter_values)
                    .await?;
            }
            TransactionEventType::Ended => {
                self.transaction_store
                    .append_meter_values(charge_station_id, &transaction_id, meter_values)
                    .await?;
                if let Some(transaction) = self
                    .transaction_store
                    .find_transaction(charge_station_id, &transaction_id)
                    .await?
                {
                    total_cost = Some(self.tariff_service.calculate_cost(&transaction)?);
                }
                self.transaction_store
                    .close_transaction(charge_station_id, &transaction_id, timestamp, total_cost)
                    .await?;
            }
        }

        info!(
            charge_station_id,
            transaction_id = %transaction_id,
            event_type = ?request.event_type,
            seq_no = request.seq_no,
            total_cost,
            "transaction event"
        );

        Ok(TransactionEventResponse {
            total_cost,
            charging_priority: None,
            id_token_info,
        })
    }
}

fn convert_meter_values(request: &TransactionEventRequest) -> Vec<store::MeterValue> {
    request
        .meter_value
        .iter()
        .flatten()
        .filter_map(|value| {
            let timestamp = parse_timestamp(&value.timestamp).ok()?;
            Some(store::MeterValue {
                timestamp,
                sampled_values: value
                    .sampled_value
                    .iter()
                    .map(|sample| store::SampledValue {
                        value: sample.value,
                        context: sample.context.clone(),
                        measurand: sample.measurand.clone(),
                        phase: sample.phase.clone(),
                        location: sample.location.clone(),
                        unit_of_measure: sample
                            .unit_of_measure
                            .as_ref()
                            .and_then(|unit| unit.unit.clone()),
                    })
                    .collect(),
            })
        })
        .collect()
}
