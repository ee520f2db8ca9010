//! Embedded JSON Schema registry for the OCPP 1.6J and 2.0.1 message sets.
//!
//! Schemas are compiled lazily and cached; the cache is write-once per name
//! and safe to share across workers. Validation distinguishes payload
//! *violations* (which the router maps onto the OCPP error taxonomy) from
//! registry problems such as an unknown schema name.

use jsonschema::Validator;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("invalid schema {name}: {reason}")]
    InvalidSchema { name: String, reason: String },

    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("{description} (instance {pointer}, schema {rule})")]
    Violation {
        /// JSON pointer to the failing instance location.
        pointer: String,
        /// JSON pointer to the schema rule that failed.
        rule: String,
        description: String,
    },
}

impl SchemaError {
    /// True for payload violations, i.e. the payload parsed but did not
    /// conform. Only these are remapped to `FormatViolation` by the router;
    /// registry errors propagate unchanged.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            SchemaError::Violation { .. } | SchemaError::InvalidPayload(_)
        )
    }
}

macro_rules! embed_schemas {
    ($($name:literal),+ $(,)?) => {{
        let mut m: HashMap<&'static str, &'static str> = HashMap::new();
        $(m.insert($name, include_str!(concat!("../schemas/", $name)));)+
        m
    }};
}

/// File-system-like namespace of embedded schema documents.
pub struct SchemaRegistry {
    sources: HashMap<&'static str, &'static str>,
    compiled: RwLock<HashMap<&'static str, Arc<Validator>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        let sources = embed_schemas!(
            "ocpp16/Authorize.json",
            "ocpp16/AuthorizeResponse.json",
            "ocpp16/BootNotification.json",
            "ocpp16/BootNotificationResponse.json",
            "ocpp16/DataTransfer.json",
            "ocpp16/DataTransferResponse.json",
            "ocpp16/Heartbeat.json",
            "ocpp16/HeartbeatResponse.json",
            "ocpp16/MeterValues.json",
            "ocpp16/MeterValuesResponse.json",
            "ocpp16/Reservation.json",
            "ocpp16/ReservationResponse.json",
            "ocpp16/StartTransaction.json",
            "ocpp16/StartTransactionResponse.json",
            "ocpp16/StatusNotification.json",
            "ocpp16/StatusNotificationResponse.json",
            "ocpp16/StopTransaction.json",
            "ocpp16/StopTransactionResponse.json",
            "ocpp201/AuthorizeRequest.json",
            "ocpp201/AuthorizeResponse.json",
            "ocpp201/BootNotificationRequest.json",
            "ocpp201/BootNotificationResponse.json",
            "ocpp201/CertificateSignedRequest.json",
            "ocpp201/CertificateSignedResponse.json",
            "ocpp201/Get15118EVCertificateRequest.json",
            "ocpp201/Get15118EVCertificateResponse.json",
            "ocpp201/GetCertificateStatusRequest.json",
            "ocpp201/GetCertificateStatusResponse.json",
            "ocpp201/HeartbeatRequest.json",
            "ocpp201/HeartbeatResponse.json",
            "ocpp201/SignCertificateRequest.json",
            "ocpp201/SignCertificateResponse.json",
            "ocpp201/StatusNotificationRequest.json",
            "ocpp201/StatusNotificationResponse.json",
            "ocpp201/TransactionEventRequest.json",
            "ocpp201/TransactionEventResponse.json",
        );
        Self {
            sources,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// All schema names in the registry, e.g. `ocpp16/Authorize.json`.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validate a raw payload against the named schema.
    pub fn validate(&self, payload: &[u8], schema_name: &str) -> Result<(), SchemaError> {
        let validator = self.validator(schema_name)?;
        let data: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| SchemaError::InvalidPayload(e.to_string()))?;

        if let Some(error) = validator.iter_errors(&data).next() {
            return Err(SchemaError::Violation {
                pointer: error.instance_path.to_string(),
                rule: error.schema_path.to_string(),
                description: error.to_string(),
            });
        }
        Ok(())
    }

    fn validator(&self, schema_name: &str) -> Result<Arc<Validator>, SchemaError> {
        {
            let compiled = self.compiled.read().unwrap_or_else(|e| e.into_inner());
            if let Some(validator) = compiled.get(schema_name) {
                return Ok(Arc::clone(validator));
            }
        }

        let (&name, &source) = self
            .sources
            .get_key_value(schema_name)
            .ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;

        let schema_value: serde_json::Value =
            serde_json::from_str(source).map_err(|e| SchemaError::InvalidSchema {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let validator = Validator::new(&schema_value).map_err(|e| SchemaError::InvalidSchema {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let mut compiled = self.compiled.write().unwrap_or_else(|e| e.into_inner());
        let entry = compiled
            .entry(name)
            .or_insert_with(|| Arc::new(validator));
        Ok(Arc::clone(entry))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
