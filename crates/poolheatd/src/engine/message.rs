//! Type-safe message system for poolheatd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::state::ClimateState;
use super::state::HvacMode;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
    },

    /// An entity was removed (integration unloaded, etc.)
    EntityRemoved { entity_id: String },

    /// A climate entity asks the engine to store its freshly projected state
    ClimateStateChanged {
        entity_id: String,
        state: Box<ClimateState>,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone, PartialEq)]
pub enum ToIntegrationMessage {
    /// Change a climate entity's target temperature
    ClimateSetTemperature { entity_id: String, temperature: f64 },

    /// Change a climate entity's operating mode
    ClimateSetHvacMode {
        entity_id: String,
        hvac_mode: HvacMode,
    },

    /// Turn a climate entity on in its default mode
    ClimateTurnOn { entity_id: String },

    /// Turn a climate entity off
    ClimateTurnOff { entity_id: String },
}

impl ToIntegrationMessage {
    /// The entity this command targets, used for routing
    pub fn entity_id(&self) -> &str {
        match self {
            ToIntegrationMessage::ClimateSetTemperature { entity_id, .. }
            | ToIntegrationMessage::ClimateSetHvacMode { entity_id, .. }
            | ToIntegrationMessage::ClimateTurnOn { entity_id }
            | ToIntegrationMessage::ClimateTurnOff { entity_id } => entity_id,
        }
    }
}
