//! HTTP endpoints.
//!
//! - `/metrics` : Prometheus text format
//! - `/`        : landing page

use crate::collector::SpeedtestCollector;
use crate::exposition;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::error;

const INDEX_HTML: &str = r#"<html>
<head><title>Speedtest Exporter</title></head>
<body>
	<h1>Speedtest Exporter</h1>
	<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

pub fn build_router(collector: Arc<SpeedtestCollector>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/", get(index))
        .with_state(collector)
}

async fn metrics(State(collector): State<Arc<SpeedtestCollector>>) -> Response {
    let samples = collector.report().await;

    match exposition::encode(&samples) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
