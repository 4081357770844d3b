//! Prometheus text exposition for collected samples.

use crate::collector::Sample;
use crate::error::Result;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Content type of [`encode`]'s output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Encode samples in the Prometheus text format.
///
/// A fresh registry is built per scrape: the values are point-in-time
/// readings of the cached result, not long-lived instruments. Samples
/// sharing a name must share label names.
pub fn encode(samples: &[Sample]) -> Result<String> {
    let registry = Registry::new();
    let mut families: Vec<(&str, GaugeVec)> = Vec::new();

    for sample in samples {
        let existing = families
            .iter()
            .find(|(name, _)| *name == sample.name)
            .map(|(_, gauge)| gauge.clone());

        let gauge = match existing {
            Some(gauge) => gauge,
            None => {
                let label_names: Vec<&str> = sample.labels.iter().map(|(k, _)| *k).collect();
                let gauge = GaugeVec::new(Opts::new(sample.name, sample.help), &label_names)?;
                registry.register(Box::new(gauge.clone()))?;
                families.push((sample.name, gauge.clone()));
                gauge
            }
        };

        let values: Vec<&str> = sample.labels.iter().map(|(_, v)| v.as_str()).collect();
        gauge.get_metric_with_label_values(&values)?.set(sample.value);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| {
        prometheus::Error::Msg(format!("metrics output is not UTF-8: {}", e)).into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{LATENCY, SCRAPE_DURATION, UP};

    fn sample(name: &'static str, value: f64, labels: &[(&'static str, &str)]) -> Sample {
        Sample {
            name,
            help: "test help",
            labels: labels.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            value,
        }
    }

    #[test]
    fn test_encode_unlabelled_gauges() -> Result<()> {
        let out = encode(&[sample(UP.name, 1.0, &[]), sample(SCRAPE_DURATION.name, 0.5, &[])])?;

        assert!(out.contains("# HELP speedtest_up test help"));
        assert!(out.contains("# TYPE speedtest_up gauge"));
        assert!(out.contains("speedtest_up 1\n"));
        assert!(out.contains("speedtest_scrape_duration_seconds 0.5\n"));
        Ok(())
    }

    #[test]
    fn test_encode_labelled_gauge() -> Result<()> {
        let labels = [("server_name", "Example \"Net\""), ("server_host", "st.example.org")];
        let out = encode(&[sample(LATENCY.name, 0.25, &labels)])?;

        assert!(out.contains("# TYPE speedtest_ping_latency_seconds gauge"));
        assert!(out.contains(
            r#"speedtest_ping_latency_seconds{server_host="st.example.org",server_name="Example \"Net\""} 0.25"#
        ));
        Ok(())
    }

    #[test]
    fn test_encode_empty() -> Result<()> {
        assert_eq!(encode(&[])?, "");
        Ok(())
    }

    #[test]
    fn test_inconsistent_labels_are_an_error() {
        let samples = [
            sample(LATENCY.name, 0.1, &[("server_name", "a")]),
            sample(LATENCY.name, 0.2, &[]),
        ];
        assert!(encode(&samples).is_err());
    }
}
