mod commands;
mod config;
mod grid;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::select;
use tracing::{info, warn};

use crate::commands::Command;
use crate::config::{AppConfig, Cli};
use crate::grid::Grid;
use crate::telemetry::Telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::try_from(cli)?;
    let telemetry = Telemetry::init(&config.log_filter, config.metrics)?;

    info!(
        rows = config.rows,
        cols = config.cols,
        period = ?config.light.period,
        jitter_ratio = config.light.jitter_ratio,
        run_for = ?config.run_for,
        "starting light grid"
    );

    let grid = Grid::build(&config)?;
    grid.start()?;

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    commands::spawn_stdin_reader(command_tx).context("failed to spawn stdin reader")?;
    let ticker = crossbeam_channel::tick(config.render_interval);
    let deadline = match config.run_for {
        Some(duration) => crossbeam_channel::after(duration),
        None => crossbeam_channel::never(),
    };

    loop {
        select! {
            recv(ticker) -> _ => println!("{}", grid.render()),
            recv(command_rx) -> command => match command {
                Ok(Command::Toggle(id)) => {
                    if !grid.toggle(&id) {
                        warn!(light = %id, "toggle ignored");
                    }
                }
                Ok(Command::Status) => println!("{}", grid.summary()),
                Ok(Command::Quit) | Err(_) => break,
            },
            recv(deadline) -> _ => {
                info!("run duration elapsed");
                break;
            }
        }
    }

    info!("shutting down");
    grid.shutdown()?;
    println!("{}", grid.summary());
    if let Some(snapshot) = telemetry.render_metrics() {
        println!("{snapshot}");
    }
    Ok(())
}
