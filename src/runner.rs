use crate::config::ExporterConfig;
use crate::error::{Result, SpeedtestError};
use crate::traits::Measure;
use crate::types::MeasurementResult;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Flags passed on every run: accept the EULA/GDPR prompts non-interactively,
/// emit JSON and report bandwidth in bytes per second.
const BASE_ARGS: &[&str] = &[
    "--accept-license",
    "--accept-gdpr",
    "--format",
    "json",
    "--unit",
    "B/s",
];

/// Runs the Ookla `speedtest` CLI.
pub struct SpeedtestRunner {
    binary: PathBuf,
    server_id: String,
    interface: String,
    source_ip: String,
    timeout: Option<Duration>,
}

impl SpeedtestRunner {
    pub fn new(config: &ExporterConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            server_id: config.server_id.clone(),
            interface: config.interface.clone(),
            source_ip: config.source_ip.clone(),
            timeout: config.timeout,
        }
    }

    /// Command line for one run. Empty selectors are left out so the CLI
    /// picks a server / interface / address itself.
    fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();

        if !self.server_id.is_empty() {
            args.push(format!("--server-id={}", self.server_id));
        }
        if !self.interface.is_empty() {
            args.push(format!("--interface={}", self.interface));
        }
        if !self.source_ip.is_empty() {
            args.push(format!("--ip={}", self.source_ip));
        }

        args
    }
}

#[async_trait]
impl Measure for SpeedtestRunner {
    async fn measure(&self) -> Result<MeasurementResult> {
        debug!(binary = %self.binary.display(), args = ?self.args(), "running speedtest");

        // stderr goes straight to ours so operators see the CLI's own messages
        let child = Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SpeedtestError::ExecutionFailed(format!(
                    "could not start {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        let output = match self.timeout {
            // Dropping the wait future on timeout kills the child.
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    SpeedtestError::ExecutionFailed(format!("timed out after {:?}", limit))
                })??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            return Err(SpeedtestError::ExecutionFailed(format!(
                "{} {}",
                self.binary.display(),
                output.status
            )));
        }

        debug!(output = %String::from_utf8_lossy(&output.stdout), "speedtest result");

        let result = MeasurementResult::from_json(&output.stdout)?;
        info!(url = %result.result.url, "recorded speedtest result");

        Ok(result)
    }
}
