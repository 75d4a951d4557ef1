//! Engine configuration options.

use crate::config::ProtocolConfig;
use crate::types::BlockNumber;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Block the engine starts at. Nothing is earmarked for it.
    pub genesis_block: BlockNumber,
    pub protocol: ProtocolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            genesis_block: BlockNumber(0),
            protocol: ProtocolConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_protocol(protocol: ProtocolConfig) -> Self {
        Self {
            protocol,
            ..Self::default()
        }
    }
}
