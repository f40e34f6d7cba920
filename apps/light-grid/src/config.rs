use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use light_sync::LightConfig;

#[derive(Debug, Parser)]
#[command(
    name = "light-grid",
    author,
    version,
    about = "Grid of self-synchronising lights rendered in the terminal"
)]
pub struct Cli {
    /// Number of grid rows.
    #[arg(long, env = "LIGHT_GRID_ROWS", default_value_t = 3)]
    pub rows: usize,

    /// Number of grid columns.
    #[arg(long, env = "LIGHT_GRID_COLS", default_value_t = 3)]
    pub cols: usize,

    /// Full blink cycle of every light.
    #[arg(long, env = "LIGHT_GRID_PERIOD_MS", default_value_t = 1_000)]
    pub period_ms: u64,

    /// Upper bound of the arbitration jitter as a fraction of the period.
    #[arg(long, env = "LIGHT_GRID_JITTER_RATIO", default_value_t = 0.01)]
    pub jitter_ratio: f64,

    /// Extra listening time after a light is re-enabled.
    #[arg(long, env = "LIGHT_GRID_SETTLE_MARGIN_MS", default_value_t = 50)]
    pub settle_margin_ms: u64,

    /// How often the grid frame is redrawn.
    #[arg(long, env = "LIGHT_GRID_RENDER_INTERVAL_MS", default_value_t = 250)]
    pub render_interval_ms: u64,

    /// Quit automatically after this many seconds (0 runs until `quit`).
    #[arg(long, env = "LIGHT_GRID_DURATION_SECS", default_value_t = 0)]
    pub duration_secs: u64,

    /// Seed for reproducible arbitration jitter.
    #[arg(long, env = "LIGHT_GRID_SEED")]
    pub seed: Option<u64>,

    /// tracing filter directive, e.g. `info,light_sync=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,

    /// Print a Prometheus snapshot of the protocol counters on exit.
    #[arg(long, env = "LIGHT_GRID_METRICS", default_value_t = false)]
    pub metrics: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub rows: usize,
    pub cols: usize,
    pub light: LightConfig,
    pub render_interval: Duration,
    pub run_for: Option<Duration>,
    pub log_filter: String,
    pub metrics: bool,
}

impl AppConfig {
    pub fn light_count(&self) -> usize {
        self.rows * self.cols
    }
}

impl TryFrom<Cli> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        ensure!(cli.rows > 0 && cli.cols > 0, "grid must have at least one light");
        ensure!(cli.render_interval_ms > 0, "render interval must be positive");

        let mut light = LightConfig::default()
            .with_period(Duration::from_millis(cli.period_ms))
            .with_jitter_ratio(cli.jitter_ratio)
            .with_settle_margin(Duration::from_millis(cli.settle_margin_ms));
        if let Some(seed) = cli.seed {
            light = light.with_seed(seed);
        }
        light.validate().context("invalid light timing")?;

        Ok(AppConfig {
            rows: cli.rows,
            cols: cli.cols,
            light,
            render_interval: Duration::from_millis(cli.render_interval_ms),
            run_for: (cli.duration_secs > 0).then(|| Duration::from_secs(cli.duration_secs)),
            log_filter: cli.log_filter,
            metrics: cli.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<AppConfig> {
        let cli = Cli::try_parse_from(std::iter::once("light-grid").chain(args.iter().copied()))?;
        AppConfig::try_from(cli)
    }

    #[test]
    fn defaults_build_a_three_by_three_grid() {
        let config = parse(&[]).expect("defaults");
        assert_eq!(config.light_count(), 9);
        assert_eq!(config.light.period, Duration::from_secs(1));
        assert!(config.run_for.is_none());
        assert!(!config.metrics);
    }

    #[test]
    fn flags_override_timing() {
        let config = parse(&[
            "--rows",
            "2",
            "--cols",
            "4",
            "--period-ms",
            "400",
            "--duration-secs",
            "5",
            "--seed",
            "9",
        ])
        .expect("flags");
        assert_eq!(config.light_count(), 8);
        assert_eq!(config.light.period, Duration::from_millis(400));
        assert_eq!(config.light.rng_seed, Some(9));
        assert_eq!(config.run_for, Some(Duration::from_secs(5)));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--rows", "0"]).is_err());
        assert!(parse(&["--period-ms", "0"]).is_err());
        assert!(parse(&["--jitter-ratio", "0.9"]).is_err());
    }
}
