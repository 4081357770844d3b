use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nested sections that must be JSON objects when present.
const SECTIONS: &[&str] = &["ping", "download", "upload", "interface", "server", "result"];

/// One `speedtest --format json` result.
///
/// Fields the CLI leaves out (packet loss is omitted when it cannot be
/// measured) decode to zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MeasurementResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub ping: Ping,
    pub download: Transfer,
    pub upload: Transfer,
    pub packet_loss: f64,
    pub isp: String,
    pub interface: Interface,
    pub server: Server,
    pub result: ResultLink,
}

impl MeasurementResult {
    /// Decode `speedtest --format json` output.
    ///
    /// serde's derived impls also accept arrays as positional structs, which
    /// together with the zero defaults would turn `[]` into an all-zero
    /// result. Only objects are accepted here.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;

        let Some(fields) = value.as_object() else {
            return Err(serde_json::Error::custom(
                "expected a JSON object at the top level",
            ));
        };
        for section in SECTIONS {
            if fields.get(*section).is_some_and(|v| !v.is_object()) {
                return Err(serde_json::Error::custom(format!(
                    "expected `{}` to be a JSON object",
                    section
                )));
            }
        }

        serde_json::from_value(value)
    }
}

/// Latency and jitter in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ping {
    pub jitter: f64,
    pub latency: f64,
}

/// Bandwidth in bytes/second (we always pass `--unit B/s`), bytes moved and
/// elapsed milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transfer {
    pub bandwidth: f64,
    pub bytes: f64,
    pub elapsed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Interface {
    pub internal_ip: String,
    pub name: String,
    pub mac_addr: String,
    pub is_vpn: bool,
    pub external_ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub country: String,
    pub host: String,
    pub port: u16,
    pub ip: String,
}

/// Correlation id and share URL of a run on speedtest.net.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultLink {
    pub id: String,
    pub url: String,
}
