use thiserror::Error;

use crate::config::ConfigError;
use crate::id::LightId;

#[derive(Debug, Error)]
pub enum LightError {
    #[error("light {0} was already started")]
    AlreadyStarted(LightId),
    #[error("failed to spawn loop thread for light {id}")]
    Spawn {
        id: LightId,
        #[source]
        source: std::io::Error,
    },
    #[error("loop thread of light {0} panicked")]
    JoinPanicked(LightId),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
