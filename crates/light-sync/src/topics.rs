//! Topic names and payloads exchanged on the bus.

use std::sync::Arc;

use signal_bus::Bus;

use crate::id::LightId;

/// Parameterless heartbeat marking the start of a cycle.
pub const SYNC: &str = "sync";
pub const MASTER_COLLISION: &str = "master-collision-detected";

pub type SharedBus = Arc<dyn Bus<LightSignal>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightSignal {
    Heartbeat,
    /// On/off edge published on `light-<id>`.
    State(bool),
    /// Published on `light-<id>-toggled` with the new enabled flag.
    Toggled { enabled: bool },
    /// Published on `master-collision-detected` by the master that stepped down.
    Collision(LightId),
}

impl LightSignal {
    pub fn as_state(&self) -> Option<bool> {
        match self {
            LightSignal::State(on) => Some(*on),
            _ => None,
        }
    }

    pub fn collision_origin(&self) -> Option<&LightId> {
        match self {
            LightSignal::Collision(id) => Some(id),
            _ => None,
        }
    }
}

pub fn state_topic(id: &LightId) -> String {
    format!("light-{id}")
}

pub fn toggled_topic(id: &LightId) -> String {
    format!("light-{id}-toggled")
}
