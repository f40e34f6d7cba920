use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub struct Telemetry {
    metrics_handle: Option<PrometheusHandle>,
}

impl Telemetry {
    /// Logs go to stderr so they never interleave with the grid on stdout.
    pub fn init(filter: &str, metrics: bool) -> Result<Self> {
        let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("failed to initialise tracing subscriber")?;

        let metrics_handle = if metrics {
            Some(
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("failed to install Prometheus metrics recorder")?,
            )
        } else {
            None
        };

        Ok(Self { metrics_handle })
    }

    pub fn render_metrics(&self) -> Option<String> {
        self.metrics_handle.as_ref().map(PrometheusHandle::render)
    }
}
