use regex::Regex;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

/// Everything needed to build the runner, cache and collector.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Speedtest server id; empty lets the CLI pick the closest one.
    pub server_id: String,
    pub interface: String,
    pub source_ip: String,
    /// How old a cached result may get before a scrape kicks off a refresh.
    pub refresh_interval: Duration,
    pub show_server_labels: bool,
    pub binary: PathBuf,
    /// Kill the CLI if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// Parse durations such as `90s`, `30m`, `1h` or `1h30m`.
///
/// Used as a clap `value_parser`, hence the `String` error.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let re = DURATION_RE.get_or_init(|| {
        Regex::new(r"(\d+)(ms|h|m|s)").expect("duration pattern is valid")
    });

    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut consumed = 0;
    for caps in re.captures_iter(input) {
        let whole = caps.get(0).map(|m| m.range()).unwrap_or_default();
        // Every character must belong to a `<number><unit>` group.
        if whole.start != consumed {
            return Err(format!("invalid duration '{}'", input));
        }
        consumed = whole.end;

        let value: u64 = caps[1]
            .parse()
            .map_err(|_| format!("duration value too large in '{}'", input))?;
        let part = match &caps[2] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.saturating_mul(60)),
            _ => Duration::from_secs(value.saturating_mul(3600)),
        };
        total = total.saturating_add(part);
    }

    if consumed != input.len() {
        return Err(format!(
            "invalid duration '{}' (expected e.g. 30s, 15m, 1h)",
            input
        ));
    }

    Ok(total)
}

/// Parse a listen address. A bare `:port` binds every IPv4 interface.
pub fn parse_bind(input: &str) -> Result<SocketAddr, String> {
    let input = input.trim();
    let addr = match input.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => input.to_string(),
    };

    addr.parse()
        .map_err(|e| format!("invalid listen address '{}': {}", input, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("45s"), Ok(Duration::from_secs(45)));
        assert_eq!(parse_duration("30m"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration(" 1m5s "), Ok(Duration::from_secs(65)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("30").is_err());
        assert!(parse_duration("m30").is_err());
        assert!(parse_duration("10 m").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("1h x").is_err());
    }

    #[test]
    fn test_parse_bind() {
        assert_eq!(parse_bind(":9876"), "0.0.0.0:9876".parse::<SocketAddr>().map_err(|e| e.to_string()));
        assert_eq!(parse_bind("127.0.0.1:9100"), "127.0.0.1:9100".parse::<SocketAddr>().map_err(|e| e.to_string()));
        assert_eq!(parse_bind("[::1]:9100"), "[::1]:9100".parse::<SocketAddr>().map_err(|e| e.to_string()));
    }

    #[test]
    fn test_parse_bind_rejects_garbage() {
        assert!(parse_bind("").is_err());
        assert!(parse_bind(":").is_err());
        assert!(parse_bind(":port").is_err());
        assert!(parse_bind("localhost").is_err());
    }
}
