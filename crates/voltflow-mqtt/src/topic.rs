//! Topic scheme: `<prefix>/in/<version>/<csId>` toward the manager,
//! `<prefix>/out/<version>/<csId>` toward the station. Inbound
//! subscriptions use MQTT shared-group semantics so manager instances scale
//! horizontally.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OcppVersion {
    V16,
    V201,
}

impl OcppVersion {
    pub const ALL: [OcppVersion; 2] = [OcppVersion::V16, OcppVersion::V201];

    pub fn as_str(self) -> &'static str {
        match self {
            OcppVersion::V16 => "ocpp1.6",
            OcppVersion::V201 => "ocpp2.0.1",
        }
    }
}

impl fmt::Display for OcppVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic {0} does not match <prefix>/in/<version>/<csId>")]
    Malformed(String),

    #[error("unknown ocpp version {0}")]
    UnknownVersion(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic {
    pub version: OcppVersion,
    pub charge_station_id: String,
}

/// Parse an inbound publish topic.
pub fn parse_in_topic(prefix: &str, topic: &str) -> Result<ParsedTopic, TopicError> {
    let rest = topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix("/in/"))
        .ok_or_else(|| TopicError::Malformed(topic.to_string()))?;

    let (version, charge_station_id) = rest
        .split_once('/')
        .ok_or_else(|| TopicError::Malformed(topic.to_string()))?;
    if charge_station_id.is_empty() || charge_station_id.contains('/') {
        return Err(TopicError::Malformed(topic.to_string()));
    }

    let version = match version {
        "ocpp1.6" => OcppVersion::V16,
        "ocpp2.0.1" => OcppVersion::V201,
        other => return Err(TopicError::UnknownVersion(other.to_string())),
    };

    Ok(ParsedTopic {
        version,
        charge_station_id: charge_station_id.to_string(),
    })
}

/// Topic the manager publishes responses and server-initiated calls to.
pub fn out_topic(prefix: &str, version: OcppVersion, charge_station_id: &str) -> String {
    format!("{prefix}/out/{version}/{charge_station_id}")
}

/// Shared-group subscription filter for one protocol version.
pub fn in_subscription(prefix: &str, group: &str, version: OcppVersion) -> String {
    format!("$share/{group}/{prefix}/in/{version}/+")
}
