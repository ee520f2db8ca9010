use crate::error::{DomainError, DomainResult};
use crate::store::{MeterValue, PendingCall, PendingCallStore, Token, TokenStore, Transaction, TransactionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// In-memory storage engine backing all three ports.
///
/// Pending-call records are retained for `pending_call_ttl` and pruned on
/// write; `take` never returns an expired record.
pub struct InMemoryEngine {
    tokens: RwLock<HashMap<(String, String), Token>>,
    transactions: RwLock<HashMap<(String, String), Transaction>>,
    pending_calls: RwLock<HashMap<(String, String), (PendingCall, Instant)>>,
    pending_call_ttl: Duration,
}

impl InMemoryEngine {
    pub fn new(pending_call_ttl: Duration) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            transactions: RwLock::new(HashMap::new()),
            pending_calls: RwLock::new(HashMap::new()),
            pending_call_ttl,
        }
    }

    fn key(charge_station_id: &str, id: &str) -> (String, String) {
        (charge_station_id.to_string(), id.to_string())
    }
}

#[async_trait]
impl TokenStore for InMemoryEngine {
    async fn set_token(&self, token: Token) -> DomainResult<()> {
        let mut tokens = self.tokens.write().await;
        tokens.insert((token.token_type.clone(), token.token_id.clone()), token);
        Ok(())
    }

    async fn find_token(&self, token_type: &str, token_id: &str) -> DomainResult<Option<Token>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&Self::key(token_type, token_id)).cloned())
    }
}

#[async_trait]
impl TransactionStore for InMemoryEngine {
    async fn create_transaction(&self, transaction: Transaction) -> DomainResult<()> {
        let mut transactions = self.transactions.write().await;
        let key = Self::key(&transaction.charge_station_id, &transaction.transaction_id);
        match transactions.get_mut(&key) {
            // Redelivered create, or create arriving after a stub was opened
            // by an out-of-order append: keep accumulated readings.
            Some(existing) => {
                if existing.id_token.is_empty() {
                    existing.id_token = transaction.id_token;
                    existing.token_type = transaction.token_type;
                    existing.started_at = transaction.started_at;
                    existing.offline = transaction.offline;
                }
            }
            None => {
                transactions.insert(key, transaction);
            }
        }
        Ok(())
    }

    async fn append_meter_values(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
        meter_values: Vec<MeterValue>,
    ) -> DomainResult<()> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .entry(Self::key(charge_station_id, transaction_id))
            .or_insert_with(|| Transaction {
                charge_station_id: charge_station_id.to_string(),
                transaction_id: transaction_id.to_string(),
                id_token: String::new(),
                token_type: String::new(),
                meter_values: Vec::new(),
                started_at: Utc::now(),
                stopped_at: None,
                offline: false,
                total_cost: None,
            });
        transaction.meter_values.extend(meter_values);
        Ok(())
    }

    async fn close_transaction(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
        stopped_at: DateTime<Utc>,
        total_cost: Option<f64>,
    ) -> DomainResult<()> {
        let mut transactions = self.transactions.write().await;
        let transaction = transactions
            .get_mut(&Self::key(charge_station_id, transaction_id))
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id.to_string()))?;
        transaction.stopped_at = Some(stopped_at);
        transaction.total_cost = total_cost;
        Ok(())
    }

    async fn find_transaction(
        &self,
        charge_station_id: &str,
        transaction_id: &str,
    ) -> DomainResult<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions
            .get(&Self::key(charge_station_id, transaction_id))
            .cloned())
    }
}

#[async_trait]
impl PendingCallStore for InMemoryEngine {
    async fn put(
        &self,
        charge_station_id: &str,
        message_id: &str,
        call: PendingCall,
    ) -> DomainResult<()> {
        let mut pending = self.pending_calls.write().await;
        let now = Instant::now();
        pending.retain(|_, (_, stored_at)| now.duration_since(*stored_at) < self.pending_call_ttl);
        pending.insert(Self::key(charge_station_id, message_id), (call, now));
        Ok(())
    }

    async fn take(
        &self,
        charge_station_id: &str,
        message_id: &str,
    ) -> DomainResult<Option<PendingCall>> {
        let mut pending = self.pending_calls.write().await;
        Ok(pending
            .remove(&Self::key(charge_station_id, message_id))
            .and_then(|(call, stored_at)| {
                (stored_at.elapsed() < self.pending_call_ttl).then_some(call)
            }))
    }
}
