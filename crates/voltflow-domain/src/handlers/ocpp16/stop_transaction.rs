use crate::error::DomainResult;
use crate::handlers::{convert_v16_meter_value, energy_register_reading, parse_timestamp};
use crate::routing::CallHandler;
use crate::services::TariffService;
use crate::store::{MeterValue, TransactionStore};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use voltflow_ocpp::v16::{
    AuthorizationStatus, IdTagInfo, StopTransactionRequest, StopTransactionResponse,
};

pub struct StopTransactionHandler {
    pub transaction_store: Arc<dyn TransactionStore>,
    pub tariff_service: Arc<dyn TariffService>,
}

#[async_trait]
impl CallHandler for StopTransactionHandler {
    type Request = StopTransactionRequest;
    type Response = StopTransactionResponse;

    async fn handle_call(
        &self,
        charge_station_id: &str,
        request: Self::Request,
    ) -> DomainResult<Self::Response> {
        let transaction_id = request.transaction_id.to_string();
        let stopped_at = parse_timestamp(&request.timestamp)?;

        let mut meter_values: Vec<MeterValue> = request
            .transaction_data
            .iter()
            .flatten()
            .filter_map(convert_v16_meter_value)
            .collect();
        meter_values.push(energy_register_reading(
            stopped_at,
            f64::from(request.meter_stop),
            "Transaction.End",
        ));
        self.transaction_store
            .append_meter_values(charge_station_id, &transaction_id, meter_values)
            .await?;

        let total_cost = match self
            .transaction_store
            .find_transaction(charge_station_id, &transaction_id)
            .await?
        {
            Some(transaction) => Some(self.tariff_service.calculate_cost(&transaction)?),
            None => None,
        };
        self.transaction_store
            .close_transaction(charge_station_id, &transaction_id, stopped_at, total_cost)
            .await?;

        info!(
            charge_station_id,
            transaction_id = request.transaction_id,
            total_cost,
            reason = request.reason.as_deref().unwrap_or(""),
            "transaction stopped"
        );

        Ok(StopTransactionResponse {
            id_tag_info: request
                .id_tag
                .map(|_| IdTagInfo::with_status(AuthorizationStatus::Accepted)),
        })
    }
}
