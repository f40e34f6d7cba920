use std::sync::Arc;

use crate::config::{ConfigError, LightConfig};
use crate::error::LightError;
use crate::id::{IdAllocator, LightId};
use crate::light::Light;
use crate::topics::SharedBus;

/// Builds lights that share a bus, a timing configuration and an id source.
#[derive(Clone)]
pub struct LightFactory {
    bus: SharedBus,
    config: LightConfig,
    ids: Arc<IdAllocator>,
}

impl LightFactory {
    pub fn new(bus: SharedBus, config: LightConfig) -> Result<Self, ConfigError> {
        Self::with_allocator(bus, config, Arc::new(IdAllocator::new()))
    }

    pub fn with_allocator(
        bus: SharedBus,
        config: LightConfig,
        ids: Arc<IdAllocator>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { bus, config, ids })
    }

    /// Creates a light with the given id, or the next sequential one.
    pub fn create(&self, id: Option<LightId>) -> Result<Light, LightError> {
        let id = id.unwrap_or_else(|| self.ids.next_id());
        Light::new(id, self.config.clone(), self.bus.clone())
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn config(&self) -> &LightConfig {
        &self.config
    }
}
