use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use signal_bus::{BusExt, Subscription};
use tracing::{debug, info, warn};

use crate::config::LightConfig;
use crate::error::LightError;
use crate::id::LightId;
use crate::latch::{SyncLatch, WaitOutcome};
use crate::topics::{self, LightSignal, SharedBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Master,
}

/// Externally observable state of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created but not started yet.
    Idle,
    Disabled,
    ArbitratingFollower,
    Master,
    Stopped,
}

struct Shared {
    id: LightId,
    label: String,
    config: LightConfig,
    bus: SharedBus,
    state_topic: String,
    toggled_topic: String,
    master: AtomicBool,
    on: AtomicBool,
    enabled: AtomicBool,
    running: AtomicBool,
    latch: SyncLatch,
}

impl Shared {
    fn set_on(&self, on: bool) {
        self.on.store(on, Ordering::Release);
        self.bus.publish(&self.state_topic, LightSignal::State(on));
    }
}

/// One autonomous blinking participant.
///
/// The light listens on `sync` from construction on, but its loop only runs
/// between [`Light::start`] and [`Light::stop`].
pub struct Light {
    shared: Arc<Shared>,
    sync_subscription: Subscription,
    started: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Light {
    pub fn new(id: LightId, config: LightConfig, bus: SharedBus) -> Result<Self, LightError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            label: id.to_string(),
            state_topic: topics::state_topic(&id),
            toggled_topic: topics::toggled_topic(&id),
            id,
            config,
            bus,
            master: AtomicBool::new(false),
            on: AtomicBool::new(false),
            enabled: AtomicBool::new(true),
            running: AtomicBool::new(false),
            latch: SyncLatch::default(),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let sync_subscription = shared.bus.on(topics::SYNC, move |_: &LightSignal| {
            if let Some(shared) = weak.upgrade() {
                shared.latch.set();
            }
        });

        Ok(Self {
            shared,
            sync_subscription,
            started: AtomicBool::new(false),
            worker: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &LightId {
        &self.shared.id
    }

    /// Topic carrying this light's on/off edges.
    pub fn signal_name(&self) -> &str {
        &self.shared.state_topic
    }

    pub fn toggled_signal_name(&self) -> &str {
        &self.shared.toggled_topic
    }

    pub fn config(&self) -> &LightConfig {
        &self.shared.config
    }

    pub fn start(&self) -> Result<(), LightError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(LightError::AlreadyStarted(self.shared.id.clone()));
        }

        let shared = self.shared.clone();
        shared.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(format!("light-{}", self.shared.label))
            .spawn(move || LightLoop::new(shared).run());

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.shared.running.store(false, Ordering::Release);
                Err(LightError::Spawn {
                    id: self.shared.id.clone(),
                    source,
                })
            }
        }
    }

    /// Asks the loop to exit. A blink hold in progress runs to completion.
    pub fn stop(&self) {
        debug!(light = %self.shared.label, "stop requested");
        self.shared.latch.request_stop();
    }

    /// Waits for the loop thread to finish. Returns immediately when the
    /// light was never started or has already been joined.
    pub fn join(&self) -> Result<(), LightError> {
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => handle
                .join()
                .map_err(|_| LightError::JoinPanicked(self.shared.id.clone())),
            None => Ok(()),
        }
    }

    pub fn shutdown(&self) -> Result<(), LightError> {
        self.stop();
        self.join()
    }

    pub fn enable(&self) {
        self.shared.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.shared.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    pub fn is_master(&self) -> bool {
        self.shared.master.load(Ordering::Acquire)
    }

    pub fn is_on(&self) -> bool {
        self.shared.on.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn role(&self) -> Role {
        if self.is_master() {
            Role::Master
        } else {
            Role::Follower
        }
    }

    pub fn phase(&self) -> Phase {
        if !self.is_running() {
            return if self.started.load(Ordering::Acquire) {
                Phase::Stopped
            } else {
                Phase::Idle
            };
        }
        if !self.is_enabled() {
            Phase::Disabled
        } else if self.is_master() {
            Phase::Master
        } else {
            Phase::ArbitratingFollower
        }
    }
}

impl Drop for Light {
    fn drop(&mut self) {
        self.shared.bus.unsubscribe(&self.sync_subscription);
        self.stop();
        if let Err(err) = self.join() {
            warn!(light = %self.shared.label, error = %err, "light loop ended abnormally");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    Continue,
    Stopped,
}

/// Clears the running flag however the loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct LightLoop {
    shared: Arc<Shared>,
    rng: StdRng,
    was_enabled: bool,
    settling: bool,
}

impl LightLoop {
    fn new(shared: Arc<Shared>) -> Self {
        let rng = match shared.config.rng_seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                shared.id.hash(&mut hasher);
                StdRng::seed_from_u64(seed ^ hasher.finish())
            }
            None => StdRng::from_entropy(),
        };
        let settling = shared.config.settle_on_start;
        Self {
            shared,
            rng,
            was_enabled: true,
            settling,
        }
    }

    fn run(mut self) {
        let shared = self.shared.clone();
        let _running = RunningGuard(&shared.running);
        info!(light = %shared.label, period = ?shared.config.period, "light loop started");

        while !shared.latch.is_stopping() {
            if !shared.enabled.load(Ordering::Acquire) {
                if self.was_enabled {
                    self.on_disabled();
                }
                if shared.latch.park(shared.config.disabled_poll) {
                    break;
                }
                continue;
            }
            if !self.was_enabled {
                self.on_enabled();
            }

            let end = if shared.master.load(Ordering::Acquire) {
                self.master_cycle()
            } else {
                self.follower_cycle()
            };
            if end == CycleEnd::Stopped {
                break;
            }
        }

        info!(light = %shared.label, "light loop exited");
    }

    fn master_cycle(&mut self) -> CycleEnd {
        let shared = &self.shared;
        let half = shared.config.half_period();

        match shared.latch.wait(half) {
            WaitOutcome::Stopping => return CycleEnd::Stopped,
            WaitOutcome::Signalled => {
                warn!(light = %shared.label, "collision detected, degrading to follower");
                shared.master.store(false, Ordering::Release);
                counter!("light_collisions_total", 1, "light" => shared.label.clone());
                shared.bus.publish(
                    topics::MASTER_COLLISION,
                    LightSignal::Collision(shared.id.clone()),
                );
            }
            WaitOutcome::TimedOut => {
                debug!(light = %shared.label, "emitting sync");
                counter!("light_heartbeats_total", 1, "light" => shared.label.clone());
                shared.bus.publish(topics::SYNC, LightSignal::Heartbeat);
            }
        }

        self.blink(half);
        CycleEnd::Continue
    }

    fn follower_cycle(&mut self) -> CycleEnd {
        let half = self.shared.config.half_period();
        let jitter = self.arbitration_jitter();
        let settling = std::mem::take(&mut self.settling);
        let (timeout, extra) = if settling {
            (self.shared.config.settle_window(), Duration::ZERO)
        } else {
            (half + jitter, jitter)
        };

        let shared = self.shared.clone();
        match shared.latch.wait(timeout) {
            WaitOutcome::Stopping => return CycleEnd::Stopped,
            WaitOutcome::Signalled => {
                debug!(light = %shared.label, "received sync");
                self.blink(half);
            }
            WaitOutcome::TimedOut => {
                debug!(light = %shared.label, ?timeout, "timed out waiting for sync");
                let (_, hold) = self.resolve_timeout(extra);
                self.blink(hold);
            }
        }
        CycleEnd::Continue
    }

    /// Decides the outcome of an expired follower wait. A sync that slipped
    /// in after the deadline keeps the light a follower, with the hold
    /// shortened by `extra` so the next cycle stays in phase.
    fn resolve_timeout(&mut self, extra: Duration) -> (Role, Duration) {
        let shared = &self.shared;
        let half = shared.config.half_period();

        if shared.latch.is_set() {
            info!(
                light = %shared.label,
                "was about to elect itself, but another light did in the meantime"
            );
            counter!("light_election_avoided_total", 1, "light" => shared.label.clone());
            return (Role::Follower, half.saturating_sub(extra));
        }

        info!(light = %shared.label, "electing itself");
        shared.master.store(true, Ordering::Release);
        counter!("light_elections_total", 1, "light" => shared.label.clone());
        shared.bus.publish(topics::SYNC, LightSignal::Heartbeat);
        (Role::Master, half)
    }

    /// On for `hold`, then off. The sync latch is cleared right before the
    /// off edge, which closes every cycle.
    fn blink(&self, hold: Duration) {
        let shared = &self.shared;
        info!(light = %shared.label, ?hold, "blinking");
        counter!("light_blinks_total", 1, "light" => shared.label.clone());

        shared.set_on(true);
        thread::sleep(hold);
        shared.latch.clear();
        shared.set_on(false);
    }

    fn on_disabled(&mut self) {
        let shared = &self.shared;
        if shared.master.swap(false, Ordering::AcqRel) {
            info!(light = %shared.label, "giving up mastership while disabled");
        }
        shared.set_on(false);
        self.was_enabled = false;
        counter!("light_toggles_total", 1, "light" => shared.label.clone());
        shared
            .bus
            .publish(&shared.toggled_topic, LightSignal::Toggled { enabled: false });
        info!(light = %shared.label, "light disabled");
    }

    fn on_enabled(&mut self) {
        let shared = &self.shared;
        // Heartbeats seen while disabled are stale.
        shared.latch.clear();
        self.settling = true;
        self.was_enabled = true;
        counter!("light_toggles_total", 1, "light" => shared.label.clone());
        shared
            .bus
            .publish(&shared.toggled_topic, LightSignal::Toggled { enabled: true });
        info!(light = %shared.label, "light enabled, listening for an ongoing sync wave");
    }

    fn arbitration_jitter(&mut self) -> Duration {
        let max = self.shared.config.max_jitter();
        if max.is_zero() {
            Duration::ZERO
        } else {
            max.mul_f64(self.rng.gen::<f64>())
        }
    }
}
