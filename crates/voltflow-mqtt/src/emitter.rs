use crate::codec;
use crate::topic::{out_topic, OcppVersion};
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use tracing::debug;
use voltflow_domain::error::{DomainError, DomainResult};
use voltflow_domain::routing::Emitter;
use voltflow_ocpp::message::Message;

/// Publishes envelopes to a station's outbound topic.
pub struct MqttEmitter {
    client: AsyncClient,
    prefix: String,
    version: OcppVersion,
}

impl MqttEmitter {
    pub fn new(client: AsyncClient, prefix: String, version: OcppVersion) -> Self {
        Self {
            client,
            prefix,
            version,
        }
    }
}

#[async_trait]
impl Emitter for MqttEmitter {
    async fn emit(&self, charge_station_id: &str, message: &Message) -> DomainResult<()> {
        let payload = codec::encode(message)?;
        let topic = out_topic(&self.prefix, self.version, charge_station_id);
        debug!(topic, action = %message.action, message_id = %message.message_id, "publishing");
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(DomainError::upstream)
    }
}
