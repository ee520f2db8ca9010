mod config;
mod telemetry;

use anyhow::Context;
use config::ServiceConfig;
use openssl::x509::X509;
use std::sync::Arc;
use telemetry::init_telemetry;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use voltflow_domain::clock::SystemClock;
use voltflow_domain::routing::{v16_router, v201_router, RouterDependencies};
use voltflow_domain::services::{
    BasicKwhTariffService, CertificateSignerService, EvCertificateProvider, IsoVersion,
    OnlineCertificateValidationService, OpcpCpoCertificateSignerService,
    OpcpMoEvCertificateProvider,
};
use voltflow_domain::store::InMemoryEngine;
use voltflow_mqtt::{subscriber, MqttEmitter, MqttHandler, MqttHandlerConfig, OcppVersion};
use voltflow_ocpp::schema::SchemaRegistry;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    init_telemetry(&config.log_level);

    if let Err(e) = run(config).await {
        error!("manager failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    info!(
        mqtt_url = %config.mqtt_url,
        storage_engine = %config.storage_engine,
        "starting voltflow-csms manager"
    );

    let engine = match config.storage_engine.as_str() {
        "inmemory" => Arc::new(InMemoryEngine::new(config.pending_call_ttl())),
        other => anyhow::bail!("unsupported storage engine {other}"),
    };

    let trust_anchors = load_trust_anchors(&config.trust_anchor_files())?;
    if trust_anchors.is_empty() {
        warn!("no trust anchors configured, contract certificate chains will not validate");
    }

    let http_client = reqwest::Client::builder()
        .build()
        .context("building http client")?;

    let certificate_validation = Arc::new(OnlineCertificateValidationService::new(
        trust_anchors,
        config.max_ocsp_attempts,
        http_client.clone(),
    ));
    let certificate_signer: Option<Arc<dyn CertificateSignerService>> =
        if config.cso_opcp_token.is_empty() {
            None
        } else {
            Some(Arc::new(OpcpCpoCertificateSignerService::new(
                config.cso_opcp_url.clone(),
                config.cso_opcp_token.clone(),
                IsoVersion::Iso15118V2,
                http_client.clone(),
            )))
        };
    let ev_certificate_provider: Option<Arc<dyn EvCertificateProvider>> =
        if config.mo_opcp_token.is_empty() {
            None
        } else {
            Some(Arc::new(OpcpMoEvCertificateProvider::new(
                config.mo_opcp_url.clone(),
                config.mo_opcp_token.clone(),
                http_client,
            )))
        };

    let mqtt_config = MqttHandlerConfig {
        broker_url: config.mqtt_url.clone(),
        prefix: config.mqtt_prefix.clone(),
        group: config.mqtt_group.clone(),
        client_id: config.mqtt_client_id.clone(),
        worker_capacity: config.worker_capacity,
    };
    let (client, eventloop) = subscriber::connect(&mqtt_config)?;

    let v16_emitter = Arc::new(MqttEmitter::new(
        client.clone(),
        config.mqtt_prefix.clone(),
        OcppVersion::V16,
    ));
    let v201_emitter = Arc::new(MqttEmitter::new(
        client.clone(),
        config.mqtt_prefix.clone(),
        OcppVersion::V201,
    ));

    let schemas = Arc::new(SchemaRegistry::new());
    let base_deps = RouterDependencies {
        clock: Arc::new(SystemClock),
        token_store: engine.clone(),
        transaction_store: engine.clone(),
        pending_call_store: engine.clone(),
        tariff_service: Arc::new(BasicKwhTariffService),
        certificate_validation,
        certificate_signer,
        ev_certificate_provider,
        emitter: v16_emitter.clone(),
        schemas: Arc::clone(&schemas),
        heartbeat_interval: config.heartbeat_interval(),
    };
    let v16 = Arc::new(v16_router(&base_deps));
    let v201 = Arc::new(v201_router(&RouterDependencies {
        emitter: v201_emitter.clone(),
        ..base_deps
    }));

    let handler = MqttHandler::new(
        mqtt_config,
        client,
        eventloop,
        v16,
        v16_emitter,
        v201,
        v201_emitter,
    );

    let shutdown = CancellationToken::new();
    let mut handler_task = tokio::spawn(handler.run(shutdown.clone()));

    tokio::select! {
        result = &mut handler_task => {
            shutdown.cancel();
            match result {
                Ok(result) => result.context("mqtt handler")?,
                Err(e) => anyhow::bail!("mqtt handler task panicked: {e}"),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            info!("shutdown signal received");
            shutdown.cancel();
            match handler_task.await {
                Ok(result) => result.context("mqtt handler")?,
                Err(e) => anyhow::bail!("mqtt handler task panicked: {e}"),
            }
        }
    }
    info!("manager stopped");
    Ok(())
}

/// Load the self-signed V2G roots from the configured PEM files.
fn load_trust_anchors(pem_files: &[String]) -> anyhow::Result<Vec<X509>> {
    let mut anchors = Vec::new();
    for file in pem_files {
        let pem =
            std::fs::read(file).with_context(|| format!("reading trust anchor file {file}"))?;
        let certificates = X509::stack_from_pem(&pem)
            .with_context(|| format!("parsing trust anchor file {file}"))?;
        for certificate in certificates {
            if certificate.issued(&certificate) == openssl::x509::X509VerifyResult::OK {
                anchors.push(certificate);
            } else {
                warn!(file, "skipping non-self-signed certificate in trust anchor file");
            }
        }
    }
    Ok(anchors)
}
