#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use light_sync::{Light, LightConfig, LightFactory, LightSignal, SharedBus};
use signal_bus::{BusExt, LocalBus};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub bus: Arc<LocalBus<LightSignal>>,
    pub factory: LightFactory,
}

impl Harness {
    pub fn new(config: LightConfig) -> Self {
        init_tracing();
        let bus = Arc::new(LocalBus::<LightSignal>::new());
        let shared: SharedBus = bus.clone();
        let factory = LightFactory::new(shared, config).expect("valid config");
        Self { bus, factory }
    }

    /// Every payload published on `topic` from now on.
    pub fn watch(&self, topic: &str) -> Receiver<LightSignal> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.bus.on(topic, move |signal: &LightSignal| {
            let _ = tx.send(signal.clone());
        });
        rx
    }

    pub fn states(&self, light: &Light) -> Receiver<LightSignal> {
        self.watch(light.signal_name())
    }

    pub fn count(&self, topic: &str) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        self.bus.on(topic, move |_: &LightSignal| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }
}

/// Next on/off edge must arrive within `within` and match `expected`.
pub fn expect_state(rx: &Receiver<LightSignal>, within: Duration, expected: bool) {
    match rx.recv_timeout(within) {
        Ok(signal) => assert_eq!(
            signal.as_state(),
            Some(expected),
            "unexpected state signal {signal:?}"
        ),
        Err(RecvTimeoutError::Timeout) => {
            panic!("no state change to {expected} within {within:?}")
        }
        Err(RecvTimeoutError::Disconnected) => panic!("state channel closed"),
    }
}

pub fn expect_signal(rx: &Receiver<LightSignal>, within: Duration) -> LightSignal {
    rx.recv_timeout(within)
        .unwrap_or_else(|err| panic!("no signal within {within:?}: {err}"))
}

pub fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value)
}
