mod cache;
mod collector;
mod config;
mod error;
mod exposition;
mod runner;
mod server;
mod traits;
mod types;

use anyhow::Result;
use cache::ResultCache;
use clap::{Parser, ValueEnum};
use collector::SpeedtestCollector;
use config::{parse_bind, parse_duration, ExporterConfig};
use runner::SpeedtestRunner;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "speedtest-exporter", version)]
#[command(about = "Prometheus exporter for Ookla speedtest results", long_about = None)]
struct Cli {
    /// Address to bind the HTTP server to (`:9876` binds all interfaces)
    #[arg(short, long, default_value = ":9876", value_parser = parse_bind)]
    bind: SocketAddr,

    /// Show debug logs
    #[arg(long)]
    debug: bool,

    /// Log format to use
    #[arg(long, alias = "logFormat", value_enum, default_value_t = LogFormat::Console)]
    log_format: LogFormat,

    /// Time between refreshes with speedtest (e.g. 30m, 1h, 90s)
    #[arg(long, alias = "refresh.interval", default_value = "30m", value_parser = parse_duration)]
    refresh_interval: Duration,

    /// Speedtest server id (empty lets speedtest pick one)
    #[arg(short, long, default_value = "")]
    server: String,

    /// Network interface to run the test on
    #[arg(long, default_value = "")]
    interface: String,

    /// Source IP address to run the test from
    #[arg(long, default_value = "")]
    source_ip: String,

    /// Annotate results with details of the speedtest server
    #[arg(long, alias = "showServerLabels")]
    show_server_labels: bool,

    /// Path to the speedtest CLI
    #[arg(long, default_value = "speedtest")]
    speedtest_binary: PathBuf,

    /// Kill speedtest if a run takes longer than this
    #[arg(long, value_parser = parse_duration)]
    speedtest_timeout: Option<Duration>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Console,
    Json,
}

impl Cli {
    fn exporter_config(&self) -> ExporterConfig {
        ExporterConfig {
            server_id: self.server.clone(),
            interface: self.interface.clone(),
            source_ip: self.source_ip.clone(),
            refresh_interval: self.refresh_interval,
            show_server_labels: self.show_server_labels,
            binary: self.speedtest_binary.clone(),
            timeout: self.speedtest_timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_format);

    let cfg = cli.exporter_config();
    let version = env!("CARGO_PKG_VERSION");
    if cfg.server_id.is_empty() {
        info!(version, "starting speedtest-exporter");
    } else {
        info!(version, server = %cfg.server_id, "starting speedtest-exporter");
    }

    let runner = Arc::new(SpeedtestRunner::new(&cfg));
    let cache = ResultCache::new(runner, cfg.refresh_interval);
    let collector = Arc::new(SpeedtestCollector::new(cache, cfg.show_server_labels));
    let app = server::build_router(collector);

    info!(bind = %cli.bind, "listening");
    let listener = tokio::net::TcpListener::bind(cli.bind).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_logging(debug: bool, format: LogFormat) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Console => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("signal received, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["speedtest-exporter"]);
        let cfg = cli.exporter_config();

        assert_eq!(cli.bind, "0.0.0.0:9876".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.refresh_interval, Duration::from_secs(1800));
        assert!(cfg.server_id.is_empty());
        assert!(!cfg.show_server_labels);
        assert_eq!(cfg.binary, PathBuf::from("speedtest"));
        assert_eq!(cfg.timeout, None);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "speedtest-exporter",
            "-b",
            "127.0.0.1:9100",
            "--refresh-interval",
            "1h30m",
            "-s",
            "1234",
            "--interface",
            "eth1",
            "--source-ip",
            "10.1.2.3",
            "--show-server-labels",
            "--speedtest-timeout",
            "2m",
            "--log-format",
            "json",
        ]);
        let cfg = cli.exporter_config();

        assert_eq!(cfg.refresh_interval, Duration::from_secs(5400));
        assert_eq!(cfg.server_id, "1234");
        assert_eq!(cfg.interface, "eth1");
        assert_eq!(cfg.source_ip, "10.1.2.3");
        assert!(cfg.show_server_labels);
        assert_eq!(cfg.timeout, Some(Duration::from_secs(120)));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn test_cli_accepts_legacy_flag_names() {
        let cli = Cli::parse_from([
            "speedtest-exporter",
            "-b",
            ":9100",
            "--refresh.interval",
            "15m",
            "--logFormat",
            "json",
            "--showServerLabels",
        ]);
        let cfg = cli.exporter_config();

        assert_eq!(cli.bind, "0.0.0.0:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.refresh_interval, Duration::from_secs(900));
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert!(cfg.show_server_labels);
    }

    #[test]
    fn test_cli_rejects_bad_bind() {
        assert!(Cli::try_parse_from(["speedtest-exporter", "-b", "nowhere"]).is_err());
    }

    #[test]
    fn test_cli_rejects_bad_interval() {
        assert!(Cli::try_parse_from(["speedtest-exporter", "--refresh-interval", "soon"]).is_err());
    }
}
