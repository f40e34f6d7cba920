//! Decentralised blink synchronisation.
//!
//! Every [`Light`] runs its own loop on a dedicated thread and talks to its
//! peers only through the shared `sync` topic of a [`signal_bus::Bus`]. A light
//! that hears no heartbeat for half a period (plus a little random jitter)
//! elects itself master and starts heartbeating; a master that hears somebody
//! else's heartbeat steps down again.

pub mod config;
pub mod error;
pub mod factory;
pub mod fleet;
pub mod id;
mod latch;
pub mod light;
pub mod topics;

pub use config::{ConfigError, LightConfig};
pub use error::LightError;
pub use factory::LightFactory;
pub use fleet::Fleet;
pub use id::{IdAllocator, LightId};
pub use light::{Light, Phase, Role};
pub use topics::{LightSignal, SharedBus};
