//! Terminal stand-in for the per-light widgets: each cell mirrors the state
//! a widget would show (on/off, master, enabled, toggle in flight).

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use light_sync::topics::{self, LightSignal};
use metrics::counter;
use light_sync::{Fleet, Light, LightFactory, LightId, SharedBus};
use parking_lot::Mutex;
use signal_bus::{Bus, BusExt, LocalBus, Subscription};
use tracing::{info, warn};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellView {
    on: bool,
    enabled: bool,
    /// Target enabled state of a toggle that has not been confirmed yet.
    pending: Option<bool>,
    edges: u64,
}

impl Default for CellView {
    fn default() -> Self {
        Self {
            on: false,
            enabled: true,
            pending: None,
            edges: 0,
        }
    }
}

pub struct Grid {
    cols: usize,
    bus: Arc<LocalBus<LightSignal>>,
    fleet: Fleet,
    views: Vec<Arc<Mutex<CellView>>>,
    collisions: Arc<AtomicUsize>,
    subscriptions: Vec<Subscription>,
}

impl Grid {
    pub fn build(config: &AppConfig) -> Result<Self> {
        let bus = Arc::new(LocalBus::<LightSignal>::new());
        let shared: SharedBus = bus.clone();
        let factory =
            LightFactory::new(shared, config.light.clone()).context("invalid light timing")?;
        let fleet = Fleet::spawn(&factory, config.light_count()).context("failed to create lights")?;

        let mut subscriptions = Vec::new();
        let mut views = Vec::with_capacity(fleet.len());
        for light in fleet.iter() {
            let view = Arc::new(Mutex::new(CellView::default()));
            let cell = view.clone();
            subscriptions.push(bus.on(light.signal_name(), move |signal: &LightSignal| {
                if let Some(on) = signal.as_state() {
                    let mut cell = cell.lock();
                    cell.on = on;
                    cell.edges += 1;
                }
            }));
            views.push(view);
        }

        let collisions = Arc::new(AtomicUsize::new(0));
        {
            let collisions = collisions.clone();
            subscriptions.push(bus.on(topics::MASTER_COLLISION, move |signal: &LightSignal| {
                collisions.fetch_add(1, Ordering::Relaxed);
                if let Some(id) = signal.collision_origin() {
                    info!(light = %id, "master collision resolved");
                }
            }));
        }

        Ok(Self {
            cols: config.cols,
            bus,
            fleet,
            views,
            collisions,
            subscriptions,
        })
    }

    pub fn start(&self) -> Result<()> {
        self.fleet.start_all().context("failed to start lights")
    }

    /// Flips a light between enabled and disabled. Returns false for an
    /// unknown id or while a previous toggle of the same light is in flight.
    pub fn toggle(&self, id: &LightId) -> bool {
        let Some((light, view)) = self.find(id) else {
            warn!(light = %id, "no such light");
            return false;
        };

        let target = {
            let mut cell = view.lock();
            if cell.pending.is_some() {
                return false;
            }
            let target = !light.is_enabled();
            cell.pending = Some(target);
            target
        };

        let cell = view.clone();
        self.bus
            .once(light.toggled_signal_name(), move |signal: &LightSignal| {
                if let LightSignal::Toggled { enabled } = signal {
                    let mut cell = cell.lock();
                    cell.enabled = *enabled;
                    cell.pending = None;
                }
            });

        if target {
            light.enable();
        } else {
            light.disable();
        }
        let action = if target { "enable" } else { "disable" };
        counter!("light_grid_toggles_total", 1, "light" => id.to_string(), "action" => action);
        info!(light = %id, enable = target, "toggle requested");
        true
    }

    pub fn render(&self) -> String {
        let mut frame = String::new();
        for (index, (light, view)) in self.fleet.iter().zip(&self.views).enumerate() {
            let cell = *view.lock();
            let lamp = if cell.on { '●' } else { '○' };
            let role = match (cell.pending, cell.enabled, light.is_master()) {
                (Some(_), _, _) => "…",
                (None, false, _) => "off",
                (None, true, true) => "MASTER",
                (None, true, false) => "",
            };
            let _ = write!(frame, "[{:>3} {} {:<6}]", light.id().to_string(), lamp, role);
            if (index + 1) % self.cols == 0 {
                frame.push('\n');
            } else {
                frame.push(' ');
            }
        }
        frame
    }

    pub fn summary(&self) -> String {
        let disabled = self.fleet.iter().filter(|light| !light.is_enabled()).count();
        let edges: u64 = self.views.iter().map(|view| view.lock().edges).sum();
        format!(
            "lights={} masters={} lit={} disabled={} collisions={} edges={} topics={}",
            self.fleet.len(),
            self.fleet.master_count(),
            self.fleet.lit_count(),
            disabled,
            self.collisions.load(Ordering::Relaxed),
            edges,
            self.bus.topics().len(),
        )
    }

    pub fn shutdown(&self) -> Result<()> {
        self.fleet.stop_all().context("failed to stop lights")?;
        for subscription in &self.subscriptions {
            self.bus.unsubscribe(subscription);
        }
        Ok(())
    }

    fn find(&self, id: &LightId) -> Option<(&Light, &Arc<Mutex<CellView>>)> {
        self.fleet
            .iter()
            .zip(&self.views)
            .find(|(light, _)| light.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use light_sync::LightConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::{Duration, Instant};

    fn config(rows: usize, cols: usize) -> AppConfig {
        AppConfig {
            rows,
            cols,
            light: LightConfig::default()
                .with_period(Duration::from_millis(200))
                .with_jitter_ratio(0.2),
            render_interval: Duration::from_millis(50),
            run_for: None,
            log_filter: "warn".into(),
            metrics: false,
        }
    }

    fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    #[test_timeout::timeout(secs = 10)]
    fn toggles_are_counted_per_action() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::set_boxed_recorder(Box::new(recorder)).expect("recorder");

        let grid = Grid::build(&config(1, 1)).expect("grid");
        grid.start().expect("start");
        let id = LightId::Seq(0);
        assert!(grid.toggle(&id));
        assert!(wait_until(Duration::from_secs(2), || grid.summary().contains("disabled=1")));
        assert!(grid.toggle(&id));

        let rendered = handle.render();
        let sample = |action: &str| {
            rendered
                .lines()
                .find(|line| {
                    line.starts_with("light_grid_toggles_total{")
                        && line.contains(r#"light="0""#)
                        && line.contains(&format!(r#"action="{action}""#))
                })
                .map(|line| line.rsplit(' ').next().unwrap_or_default().to_owned())
        };
        assert_eq!(sample("disable").as_deref(), Some("1"));
        assert_eq!(sample("enable").as_deref(), Some("1"));
        grid.shutdown().expect("shutdown");
    }

    #[test]
    fn renders_rows_of_cells() {
        let grid = Grid::build(&config(2, 3)).expect("grid");
        let frame = grid.render();
        assert_eq!(frame.lines().count(), 2);
        assert_eq!(frame.matches('○').count(), 6);
        assert!(frame.contains("[  5 ○"));
    }

    #[test_timeout::timeout(secs = 20)]
    fn toggled_light_shows_pending_then_disabled() {
        let grid = Grid::build(&config(1, 2)).expect("grid");
        grid.start().expect("start");
        assert!(wait_until(Duration::from_secs(2), || grid.render().contains("MASTER")));

        let id = LightId::Seq(1);
        assert!(grid.toggle(&id));
        assert!(!grid.toggle(&id), "second toggle waits for the first");
        assert!(wait_until(Duration::from_secs(2), || grid.render().contains("off")));
        assert!(grid.summary().contains("disabled=1"));

        assert!(grid.toggle(&id));
        assert!(wait_until(Duration::from_secs(2), || grid.summary().contains("disabled=0")
            && !grid.render().contains('…')));

        assert!(!grid.toggle(&LightId::from("missing")));
        grid.shutdown().expect("shutdown");
    }
}
