//! MQTT transport for the manager: the wire codec for bus envelopes, the
//! in/out topic scheme, the shared-group subscriber with its bounded worker
//! pool, and the emitter the routers publish through.

pub mod codec;
pub mod emitter;
pub mod subscriber;
pub mod topic;

pub use emitter::MqttEmitter;
pub use subscriber::{connect, MqttHandler, MqttHandlerConfig};
pub use topic::OcppVersion;
