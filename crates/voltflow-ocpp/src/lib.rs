//! OCPP message types, bus envelope model, and JSON Schema validation.
//!
//! Holds the wire-level vocabulary shared by the router and the transport:
//! the typed request/response structs for the OCPP 1.6J and 2.0.1 subsets
//! the manager supports, the bus envelope, the protocol error taxonomy, and
//! the embedded schema registry.

pub mod error;
pub mod message;
pub mod schema;
pub mod v16;
pub mod v201;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker for OCPP request payloads.
pub trait OcppRequest: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static {}

/// Marker for OCPP response payloads.
pub trait OcppResponse: Serialize + DeserializeOwned + std::fmt::Debug + Send + Sync + 'static {}
