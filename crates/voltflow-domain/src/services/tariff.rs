use crate::error::DomainResult;
use crate::store::Transaction;

/// Computes the cost of a closed transaction from its meter values.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TariffService: Send + Sync {
    fn calculate_cost(&self, transaction: &Transaction) -> DomainResult<f64>;
}

/// Flat per-kWh tariff over the active-import energy register.
pub struct BasicKwhTariffService;

const PRICE_PER_KWH: f64 = 0.55;

impl TariffService for BasicKwhTariffService {
    fn calculate_cost(&self, transaction: &Transaction) -> DomainResult<f64> {
        let mut readings: Vec<(chrono::DateTime<chrono::Utc>, f64)> = Vec::new();
        for meter_value in &transaction.meter_values {
            for sample in &meter_value.sampled_values {
                if sample.measurand.as_deref() != Some("Energy.Active.Import.Register") {
                    continue;
                }
                let wh = match sample.unit_of_measure.as_deref() {
                    Some("kWh") => sample.value * 1000.0,
                    // Registers default to Wh when the unit is omitted.
                    _ => sample.value,
                };
                readings.push((meter_value.timestamp, wh));
            }
        }
        readings.sort_by_key(|(timestamp, _)| *timestamp);

        let consumed_kwh = match (readings.first(), readings.last()) {
            (Some((_, start)), Some((_, stop))) => (stop - start).max(0.0) / 1000.0,
            _ => 0.0,
        };
        Ok((consumed_kwh * PRICE_PER_KWH * 100.0).round() / 100.0)
    }
}
