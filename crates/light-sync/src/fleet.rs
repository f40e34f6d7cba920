use crate::error::LightError;
use crate::factory::LightFactory;
use crate::id::LightId;
use crate::light::Light;

/// A group of lights started and stopped together.
#[derive(Default)]
pub struct Fleet {
    lights: Vec<Light>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `count` lights with sequential ids. They are not started.
    pub fn spawn(factory: &LightFactory, count: usize) -> Result<Self, LightError> {
        let lights = (0..count)
            .map(|_| factory.create(None))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { lights })
    }

    pub fn push(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn start_all(&self) -> Result<(), LightError> {
        for light in &self.lights {
            light.start()?;
        }
        Ok(())
    }

    /// Signals every light first, then joins them one by one, so the
    /// whole fleet quiesces in roughly one period.
    pub fn stop_all(&self) -> Result<(), LightError> {
        for light in &self.lights {
            light.stop();
        }
        let mut first_error = None;
        for light in &self.lights {
            if let Err(err) = light.join() {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn get(&self, id: &LightId) -> Option<&Light> {
        self.lights.iter().find(|light| light.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn master_count(&self) -> usize {
        self.lights.iter().filter(|light| light.is_master()).count()
    }

    pub fn lit_count(&self) -> usize {
        self.lights.iter().filter(|light| light.is_on()).count()
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        for light in &self.lights {
            light.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LightConfig;
    use crate::light::Phase;
    use crate::topics::{LightSignal, SharedBus};
    use signal_bus::LocalBus;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test_timeout::timeout(secs = 10)]
    fn stop_all_joins_every_light_quickly() {
        let bus: SharedBus = Arc::new(LocalBus::<LightSignal>::new());
        let config = LightConfig::default().with_period(Duration::from_millis(200));
        let factory = LightFactory::new(bus, config).expect("factory");
        let fleet = Fleet::spawn(&factory, 6).expect("fleet");
        assert_eq!(fleet.len(), 6);
        assert!(fleet.get(&LightId::Seq(5)).is_some());

        fleet.start_all().expect("start");
        std::thread::sleep(Duration::from_millis(300));

        let started = Instant::now();
        fleet.stop_all().expect("stop");
        assert!(started.elapsed() < Duration::from_millis(600));
        assert!(fleet.iter().all(|light| light.phase() == Phase::Stopped));
    }
}
