//! Domain handlers for both OCPP versions.
//!
//! Handlers receive requests that already passed schema validation and
//! produce responses the router re-validates before emission. All
//! collaborators are injected as `Arc<dyn Trait>` ports.

pub mod ocpp16;
pub mod ocpp201;

use crate::error::DomainResult;
use crate::store::{MeterValue, SampledValue};
use chrono::{DateTime, Utc};
use voltflow_ocpp::error::OcppError;

pub(crate) fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| OcppError::format_violation(format!("invalid timestamp {value}: {e}")).into())
}

/// Convert a 1.6 meter value (string readings) into the store form.
/// Unparseable entries are dropped with a warning rather than failing the
/// whole request.
pub(crate) fn convert_v16_meter_value(
    value: &voltflow_ocpp::v16::MeterValue,
) -> Option<MeterValue> {
    let timestamp = match parse_timestamp(&value.timestamp) {
        Ok(ts) => ts,
        Err(err) => {
            tracing::warn!(error = %err, "skipping meter value with bad timestamp");
            return None;
        }
    };
    let sampled_values = value
        .sampled_value
        .iter()
        .filter_map(|sample| match sample.value.parse::<f64>() {
            Ok(parsed) => Some(SampledValue {
                value: parsed,
                context: sample.context.clone(),
                measurand: sample.measurand.clone(),
                phase: sample.phase.clone(),
                location: sample.location.clone(),
                unit_of_measure: sample.unit.clone(),
            }),
            Err(_) => {
                tracing::warn!(value = %sample.value, "skipping non-numeric sampled value");
                None
            }
        })
        .collect();
    Some(MeterValue {
        timestamp,
        sampled_values,
    })
}

/// A single Wh register reading, as recorded at transaction start/stop.
pub(crate) fn energy_register_reading(
    timestamp: DateTime<Utc>,
    wh: f64,
    context: &str,
) -> MeterValue {
    MeterValue {
        timestamp,
        sampled_values: vec![SampledValue {
            value: wh,
            context: Some(context.to_string()),
            measurand: Some("Energy.Active.Import.Register".to_string()),
            phase: None,
            location: None,
            unit_of_measure: Some("Wh".to_string()),
        }],
    }
}
