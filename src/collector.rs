use crate::cache::ResultCache;
use crate::types::MeasurementResult;
use std::time::Instant;
use tracing::{debug, error};

/// Name and help text of one exported gauge.
pub struct Desc {
    pub name: &'static str,
    pub help: &'static str,
}

pub const UP: Desc = Desc {
    name: "speedtest_up",
    help: "Whether the last speedtest run succeeded",
};
pub const SCRAPE_DURATION: Desc = Desc {
    name: "speedtest_scrape_duration_seconds",
    help: "How long the scrape took to complete in seconds",
};
pub const LATENCY: Desc = Desc {
    name: "speedtest_ping_latency_seconds",
    help: "Ping latency",
};
pub const JITTER: Desc = Desc {
    name: "speedtest_ping_jitter_seconds",
    help: "Ping jitter",
};
pub const DOWNLOAD_SPEED: Desc = Desc {
    name: "speedtest_download_bytes_second",
    help: "Download speed in B/s",
};
pub const UPLOAD_SPEED: Desc = Desc {
    name: "speedtest_upload_bytes_second",
    help: "Upload speed in B/s",
};
pub const DOWNLOADED: Desc = Desc {
    name: "speedtest_download_bytes",
    help: "Downloaded bytes",
};
pub const UPLOADED: Desc = Desc {
    name: "speedtest_upload_bytes",
    help: "Uploaded bytes",
};
pub const PACKET_LOSS: Desc = Desc {
    name: "speedtest_packet_loss_pct",
    help: "Packet loss percentage",
};

pub const SERVER_LABELS: [&str; 4] = [
    "server_name",
    "server_location",
    "server_country",
    "server_host",
];

/// One gauge value, ready for exposition.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    fn new(desc: &Desc, value: f64, labels: Vec<(&'static str, String)>) -> Self {
        Self {
            name: desc.name,
            help: desc.help,
            labels,
            value,
        }
    }
}

/// Turns the cached speedtest result into samples, once per scrape.
pub struct SpeedtestCollector {
    cache: ResultCache,
    show_server_labels: bool,
}

impl SpeedtestCollector {
    pub fn new(cache: ResultCache, show_server_labels: bool) -> Self {
        Self {
            cache,
            show_server_labels,
        }
    }

    /// Collect all samples. `speedtest_up` and the scrape duration are always
    /// present; measurement samples only when a result is available.
    pub async fn report(&self) -> Vec<Sample> {
        let start = Instant::now();
        let mut samples = Vec::with_capacity(9);

        let up = match self.cache.get_or_refresh().await {
            Ok(result) => {
                samples.extend(self.measurement_samples(&result));
                1.0
            }
            Err(e) => {
                error!(error = %e, "failed to collect");
                0.0
            }
        };

        samples.push(Sample::new(&UP, up, Vec::new()));
        samples.push(Sample::new(
            &SCRAPE_DURATION,
            start.elapsed().as_secs_f64(),
            Vec::new(),
        ));

        debug!(count = samples.len(), "collected samples");
        samples
    }

    fn measurement_samples(&self, result: &MeasurementResult) -> Vec<Sample> {
        let labels = self.server_labels(result);

        // speedtest reports milliseconds, Prometheus wants base units.
        [
            (&DOWNLOAD_SPEED, result.download.bandwidth),
            (&UPLOAD_SPEED, result.upload.bandwidth),
            (&LATENCY, result.ping.latency / 1000.0),
            (&JITTER, result.ping.jitter / 1000.0),
            (&UPLOADED, result.upload.bytes),
            (&DOWNLOADED, result.download.bytes),
            (&PACKET_LOSS, result.packet_loss),
        ]
        .into_iter()
        .map(|(desc, value)| Sample::new(desc, value, labels.clone()))
        .collect()
    }

    fn server_labels(&self, result: &MeasurementResult) -> Vec<(&'static str, String)> {
        if !self.show_server_labels {
            return Vec::new();
        }

        let server = &result.server;
        SERVER_LABELS
            .into_iter()
            .zip([
                server.name.clone(),
                server.location.clone(),
                server.country.clone(),
                server.host.clone(),
            ])
            .collect()
    }
}
