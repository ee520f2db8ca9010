//! Storage ports consumed by the handlers and the call makers.
//!
//! Each port is polymorphic over backends; the in-memory engine in this
//! module implements all of them with read-your-writes semantics. Durable
//! drivers plug in behind the same traits.

mod in_memory;

pub use in_memory::InMemoryEngine;

use crate::error::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a token may be cached by stations and local controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMode {
    Always,
    Allowed,
    AllowedOffline,
    Never,
}

/// An authorization token, keyed by `(token_type, token_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: String,
    pub token_id: String,
    pub issuer: String,
    pub cache_mode: CacheMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set_token(&self, token: Token) -> DomainResult<()>;

    async fn find_token(&self, token_type: &str, token_id: &str) -> DomainResult<Option<Token>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledValue {
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterValue {
    pub timestamp: DateTime<Utc>,
    pub sampled_values: Vec<SampledValue>,
}

/// A charging transaction, keyed by `(charge_station_id, transaction_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub charge_station_id: String,
    pub transaction_id: String,
    pub id_token: String,
    pub token_type: String,
    pub meter_values: Vec<MeterValue>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    pub offline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Open a transaction. Creation is an idempotent upsert: replaying the
    /// same create (bus redelivery) leaves an already-open transaction
    /// untouched.
    async fn create_transaction(&self, transaction: Transaction) -> DomainResult<()>;

    /// Append readings to a transaction. Appending to an unknown transaction
    /// opens a stub so that out-of-order delivery is not lost.
    async fn append_meter_values(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
        meter_values: Vec<MeterValue>,
    ) -> DomainResult<()>;

    async fn close_transaction(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
        stopped_at: DateTime<Utc>,
        total_cost: Option<f64>,
    ) -> DomainResult<()>;

    async fn find_transaction(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
    ) -> DomainResult<Option<Transaction>>;
}

/// State persisted for a server-initiated call awaiting its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCall {
    pub action: String,
    pub request_payload: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<u8>>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PendingCallStore: Send + Sync {
    /// Record a pending call. Must complete before the call is emitted,
    /// otherwise a fast response can race the write.
    async fn put(
        &self,
        charge_station_id: &str,
        message_id: &str,
        call: PendingCall,
    ) -> DomainResult<()>;

    /// Fetch and remove the pending record for a correlation id. Returns
    /// `None` when the record never existed or its retention expired.
    async fn take(
        &self,
        charge_station_id: &str,
        message_id: &str,
    ) -> DomainResult<Option<PendingCall>>;
}
