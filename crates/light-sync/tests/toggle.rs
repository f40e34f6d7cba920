mod common;

use signal_bus::Bus;

use std::time::Duration;

use common::{expect_signal, expect_state, secs, Harness};
use light_sync::{LightConfig, LightSignal, Phase, Role};

#[test_timeout::timeout(secs = 20)]
fn disable_parks_light_and_enable_resumes_it() {
    let period = Duration::from_millis(400);
    let harness = Harness::new(LightConfig::default().with_period(period));
    let light = harness.factory.create(None).expect("light");
    let states = harness.states(&light);
    let toggles = harness.watch(light.toggled_signal_name());
    light.start().expect("start");

    expect_state(&states, secs(0.4), true);
    assert!(light.is_master());

    light.disable();
    assert!(!light.is_enabled());
    // the running blink completes before the disable is observed
    let toggled = expect_signal(&toggles, period * 2);
    assert_eq!(toggled, LightSignal::Toggled { enabled: false });
    assert_eq!(light.phase(), Phase::Disabled);
    assert_eq!(light.role(), Role::Follower);
    assert!(!light.is_on());

    // the loop keeps polling the flag without re-announcing the transition
    std::thread::sleep(period * 2);
    assert!(toggles.try_recv().is_err());
    while let Ok(signal) = states.try_recv() {
        assert_eq!(signal.as_state(), Some(false));
    }

    light.enable();
    let toggled = expect_signal(&toggles, secs(0.3));
    assert_eq!(toggled, LightSignal::Toggled { enabled: true });

    // settle window of period + margin, then self-election
    expect_state(&states, period + secs(0.2), true);
    expect_state(&states, secs(0.3), false);
    assert!(light.is_master());
    assert!(toggles.try_recv().is_err());

    light.shutdown().expect("shutdown");
}

#[test_timeout::timeout(secs = 20)]
fn disabled_light_ignores_heartbeats() {
    let harness = Harness::new(LightConfig::default().with_period(secs(0.4)));
    let light = harness.factory.create(None).expect("light");
    let states = harness.states(&light);
    let toggles = harness.watch(light.toggled_signal_name());

    light.disable();
    light.start().expect("start");
    assert_eq!(
        expect_signal(&toggles, secs(0.3)),
        LightSignal::Toggled { enabled: false }
    );
    expect_state(&states, secs(0.1), false);

    for _ in 0..3 {
        harness
            .bus
            .publish(light_sync::topics::SYNC, LightSignal::Heartbeat);
        std::thread::sleep(Duration::from_millis(150));
    }
    assert!(states.try_recv().is_err());
    assert!(!light.is_on());

    light.shutdown().expect("shutdown");
    assert_eq!(light.phase(), Phase::Stopped);
}
