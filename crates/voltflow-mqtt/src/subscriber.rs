//! Shared-group MQTT subscriber and its worker plane.
//!
//! Envelopes are dispatched to per-station worker tasks: messages for one
//! station are processed strictly in arrival order, while a semaphore bounds
//! total concurrency across stations. Handler errors are logged at the
//! worker and the message is considered consumed; handlers are
//! replay-tolerant, so redelivery is safe either way.

use crate::codec;
use crate::topic::{in_subscription, parse_in_topic, OcppVersion};
use dashmap::DashMap;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use voltflow_domain::error::{DomainError, DomainResult};
use voltflow_domain::routing::{Emitter, Router};
use voltflow_ocpp::message::Message;

#[derive(Debug, Clone)]
pub struct MqttHandlerConfig {
    /// e.g. `mqtt://127.0.0.1:1883`
    pub broker_url: String,
    pub prefix: String,
    pub group: String,
    pub client_id: String,
    /// Upper bound on concurrently handled envelopes.
    pub worker_capacity: usize,
}

/// Create the MQTT client and event loop. The client is shared with the
/// emitters, which is why construction is separate from [`MqttHandler::new`].
pub fn connect(config: &MqttHandlerConfig) -> DomainResult<(AsyncClient, EventLoop)> {
    let (host, port) = parse_broker_url(&config.broker_url)?;
    let mut options = MqttOptions::new(&config.client_id, host, port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);
    Ok(AsyncClient::new(options, 100))
}

fn parse_broker_url(url: &str) -> DomainResult<(String, u16)> {
    let stripped = url
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://");
    match stripped.split_once(':') {
        None => Ok((stripped.to_string(), 1883)),
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::upstream(anyhow::anyhow!("invalid port in broker url {url}"))
            })?;
            Ok((host.to_string(), port))
        }
    }
}

struct VersionPlane {
    router: Arc<Router>,
    emitter: Arc<dyn Emitter>,
}

/// The dispatch plane shared by the event loop and the station workers.
struct Dispatcher {
    prefix: String,
    v16: VersionPlane,
    v201: VersionPlane,
    workers: Arc<Semaphore>,
    stations: DashMap<String, mpsc::UnboundedSender<Message>>,
}

impl Dispatcher {
    fn dispatch(self: &Arc<Self>, publish: &Publish, shutdown: &CancellationToken) {
        let parsed = match parse_in_topic(&self.prefix, &publish.topic) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(topic = %publish.topic, error = %e, "skipping message on unexpected topic");
                return;
            }
        };
        let message = match codec::decode(&publish.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    topic = %publish.topic,
                    charge_station_id = %parsed.charge_station_id,
                    error = %e,
                    "discarding undecodable envelope"
                );
                return;
            }
        };

        let station_key = format!("{}/{}", parsed.version, parsed.charge_station_id);
        let sender = self
            .stations
            .entry(station_key)
            .or_insert_with(|| {
                spawn_station_worker(
                    Arc::clone(self),
                    parsed.version,
                    parsed.charge_station_id.clone(),
                    shutdown.clone(),
                )
            })
            .clone();
        if sender.send(message).is_err() {
            error!(
                charge_station_id = %parsed.charge_station_id,
                "station worker gone, dropping message"
            );
        }
    }

    fn plane(&self, version: OcppVersion) -> &VersionPlane {
        match version {
            OcppVersion::V16 => &self.v16,
            OcppVersion::V201 => &self.v201,
        }
    }
}

/// One worker per station keeps that station's messages in arrival order;
/// the shared semaphore bounds work across stations.
fn spawn_station_worker(
    dispatcher: Arc<Dispatcher>,
    version: OcppVersion,
    charge_station_id: String,
    shutdown: CancellationToken,
) -> mpsc::UnboundedSender<Message> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let plane = dispatcher.plane(version);
        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            let Ok(_permit) = dispatcher.workers.acquire().await else {
                break;
            };
            debug!(
                charge_station_id,
                action = %message.action,
                message_id = %message.message_id,
                "handling envelope"
            );
            if let Err(e) = plane
                .router
                .route(&charge_station_id, &message, plane.emitter.as_ref())
                .await
            {
                warn!(
                    charge_station_id,
                    action = %message.action,
                    message_id = %message.message_id,
                    error = %e,
                    "routing failed"
                );
            }
        }
    });
    sender
}

pub struct MqttHandler {
    config: MqttHandlerConfig,
    client: AsyncClient,
    eventloop: EventLoop,
    dispatcher: Arc<Dispatcher>,
}

impl MqttHandler {
    pub fn new(
        config: MqttHandlerConfig,
        client: AsyncClient,
        eventloop: EventLoop,
        v16_router: Arc<Router>,
        v16_emitter: Arc<dyn Emitter>,
        v201_router: Arc<Router>,
        v201_emitter: Arc<dyn Emitter>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher {
            prefix: config.prefix.clone(),
            v16: VersionPlane {
                router: v16_router,
                emitter: v16_emitter,
            },
            v201: VersionPlane {
                router: v201_router,
                emitter: v201_emitter,
            },
            workers: Arc::new(Semaphore::new(config.worker_capacity.max(1))),
            stations: DashMap::new(),
        });
        Self {
            config,
            client,
            eventloop,
            dispatcher,
        }
    }

    /// Subscribe and pump the event loop until shutdown.
    #[instrument(name = "mqtt_handler", skip_all, fields(group = %self.config.group))]
    pub async fn run(self, shutdown: CancellationToken) -> DomainResult<()> {
        let MqttHandler {
            config,
            client,
            mut eventloop,
            dispatcher,
        } = self;

        for version in OcppVersion::ALL {
            let filter = in_subscription(&config.prefix, &config.group, version);
            client
                .subscribe(&filter, QoS::AtLeastOnce)
                .await
                .map_err(DomainError::upstream)?;
            info!(filter, "subscribed");
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, disconnecting");
                    let _ = client.disconnect().await;
                    return Ok(());
                }
                event = eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            dispatcher.dispatch(&publish, &shutdown);
                        }
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            info!("connected to MQTT broker");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            return Err(DomainError::upstream(anyhow::anyhow!(
                                "MQTT event loop error: {e}"
                            )));
                        }
                    }
                }
            }
        }
    }
}
