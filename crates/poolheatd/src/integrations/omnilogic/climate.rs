//! Heater climate entity.
//!
//! Exposes an OmniLogic virtual heater as a climate entity. Reads project the
//! coordinator's device tree on every call; commands go to the controller
//! first and, once accepted, are written into the cached telemetry so the
//! next read reflects them without waiting for a poll.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::api::ApiError;
use super::api::OmniApi;
use super::coordinator::Coordinator;
use super::model::DeviceTree;
use super::model::ModelError;
use super::model::NO_READING;
use super::model::OmniType;
use super::model::SystemId;
use super::model::Units;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::state::ClimateFeature;
use crate::engine::state::ClimateState;
use crate::engine::state::HvacAction;
use crate::engine::state::HvacMode;
use crate::engine::state::OnOff;
use crate::engine::state::TemperatureUnit;

/// Modes a heater can be put in.
pub const HVAC_MODES: [HvacMode; 2] = [HvacMode::Off, HvacMode::Heat];

/// Capabilities every heater advertises.
pub const SUPPORTED_FEATURES: [ClimateFeature; 3] = [
    ClimateFeature::TargetTemperature,
    ClimateFeature::TurnOff,
    ClimateFeature::TurnOn,
];

/// Suffix appended to the body of water's name to form the entity name.
const NAME: &str = "Heater";

#[derive(Debug, thiserror::Error)]
pub enum ClimateError {
    #[error("Unrecognized hvac mode: {0}")]
    UnsupportedHvacMode(HvacMode),

    #[error("Temperature {0} is not a valid set point")]
    InvalidTemperature(f64),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Controller command failed: {0}")]
    Api(#[from] ApiError),
}

/// Climate entity backed by one OmniLogic virtual heater.
pub struct HeaterClimate<A: OmniApi> {
    coordinator: Arc<Coordinator<A>>,
    entity_id: String,
    system_id: SystemId,
    bow_id: SystemId,

    /// Physical heaters reported in the extended attributes; fixed at setup
    heater_equipment_ids: Vec<SystemId>,

    /// Where state writes go once the integration is set up
    to_engine: Option<FromIntegrationSender>,
}

/// Build one climate entity per virtual heater in the coordinator's tree.
///
/// Every entity is handed the ids of all physical heaters in the tree.
pub fn discover<A: OmniApi>(
    coordinator: &Arc<Coordinator<A>>,
) -> Result<Vec<HeaterClimate<A>>, ClimateError> {
    let (virtual_heaters, heater_equipment_ids) = coordinator.read(|tree| {
        let mut virtual_heaters = Vec::new();
        let mut heater_equipment_ids = Vec::new();
        for (system_id, device) in tree.of_platform("climate") {
            match device.omni_type() {
                OmniType::VirtHeater => {
                    debug!(
                        "Configuring climate heater with ID: {}, Name: {}",
                        system_id,
                        device.name()
                    );
                    virtual_heaters.push(system_id);
                }
                OmniType::HeaterEquip => heater_equipment_ids.push(system_id),
                _ => {}
            }
        }
        (virtual_heaters, heater_equipment_ids)
    });

    virtual_heaters
        .into_iter()
        .map(|system_id| {
            HeaterClimate::new(coordinator.clone(), system_id, heater_equipment_ids.clone())
        })
        .collect()
}

impl<A: OmniApi> HeaterClimate<A> {
    pub fn new(
        coordinator: Arc<Coordinator<A>>,
        system_id: SystemId,
        heater_equipment_ids: Vec<SystemId>,
    ) -> Result<Self, ClimateError> {
        let bow_id = coordinator.read(|tree| {
            tree.virtual_heater(system_id)
                .map(|heater| heater.config.bow_id)
        })?;

        Ok(Self {
            coordinator,
            entity_id: format!("climate.omnilogic_heater_{}", system_id),
            system_id,
            bow_id,
            heater_equipment_ids,
            to_engine: None,
        })
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn system_id(&self) -> SystemId {
        self.system_id
    }

    pub fn bow_id(&self) -> SystemId {
        self.bow_id
    }

    /// Connect the entity to the engine so it can publish state writes
    pub fn attach(&mut self, to_engine: FromIntegrationSender) {
        self.to_engine = Some(to_engine);
    }

    pub fn available(&self) -> bool {
        self.coordinator.available()
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.coordinator.read(temperature_unit)
    }

    pub fn min_temp(&self) -> Result<i32, ClimateError> {
        Ok(self
            .coordinator
            .read(|tree| tree.virtual_heater(self.system_id).map(|h| h.config.min_temp))?)
    }

    pub fn max_temp(&self) -> Result<i32, ClimateError> {
        Ok(self
            .coordinator
            .read(|tree| tree.virtual_heater(self.system_id).map(|h| h.config.max_temp))?)
    }

    pub fn target_temperature(&self) -> Result<Option<i32>, ClimateError> {
        Ok(self.coordinator.read(|tree| {
            tree.virtual_heater(self.system_id)
                .map(|h| h.telemetry.current_set_point)
        })?)
    }

    /// Water temperature of the body of water this heater serves
    pub fn current_temperature(&self) -> Result<Option<i32>, ClimateError> {
        Ok(self
            .coordinator
            .read(|tree| tree.bow(self.bow_id).map(|bow| water_temp(bow.telemetry.water_temp)))?)
    }

    pub fn hvac_mode(&self) -> Result<HvacMode, ClimateError> {
        Ok(self.coordinator.read(|tree| {
            tree.virtual_heater(self.system_id)
                .map(|h| hvac_mode(h.telemetry.enabled))
        })?)
    }

    /// The action mirrors the mode: the controller does not report whether
    /// the heater is idling at its set point.
    pub fn hvac_action(&self) -> Result<HvacAction, ClimateError> {
        Ok(hvac_action(self.hvac_mode()?))
    }

    pub fn current_operation(&self) -> Result<OnOff, ClimateError> {
        Ok(self.coordinator.read(|tree| {
            tree.virtual_heater(self.system_id)
                .map(|h| OnOff::from(h.telemetry.enabled))
        })?)
    }

    /// Solar set point plus one group of attributes per physical heater,
    /// prefixed with the heater's lower-cased name.
    pub fn extra_state_attributes(
        &self,
    ) -> Result<BTreeMap<String, serde_json::Value>, ClimateError> {
        Ok(self.coordinator.read(|tree| self.attributes(tree))?)
    }

    /// Project the full entity state from the current tree
    pub fn state(&self) -> Result<ClimateState, ClimateError> {
        let available = self.available();
        Ok(self.coordinator.read(|tree| -> Result<ClimateState, ModelError> {
            let heater = tree.virtual_heater(self.system_id)?;
            let bow = tree.bow(self.bow_id)?;
            let mode = hvac_mode(heater.telemetry.enabled);

            Ok(ClimateState {
                name: format!("{} {}", bow.config.name, NAME),
                available,
                temperature_unit: temperature_unit(tree),
                min_temp: heater.config.min_temp,
                max_temp: heater.config.max_temp,
                target_temperature: heater.telemetry.current_set_point,
                current_temperature: water_temp(bow.telemetry.water_temp),
                hvac_mode: mode,
                hvac_action: hvac_action(mode),
                hvac_modes: HVAC_MODES.to_vec(),
                current_operation: OnOff::from(heater.telemetry.enabled),
                supported_features: SUPPORTED_FEATURES.to_vec(),
                attributes: self.attributes(tree)?,
            })
        })?)
    }

    /// Send a new set point to the controller, then cache it.
    ///
    /// The controller only takes whole degrees, so the value is truncated.
    /// Bounds are not checked here; the controller decides what it accepts.
    /// Values with no whole-degree `i32` form (NaN, infinities, out of range)
    /// are rejected.
    pub async fn set_temperature(&self, temperature: f64) -> Result<(), ClimateError> {
        let truncated = temperature.trunc();
        if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&truncated) {
            return Err(ClimateError::InvalidTemperature(temperature));
        }
        let set_point = truncated as i32;
        let unit = self.temperature_unit();

        self.coordinator
            .api()
            .set_heater(self.bow_id, self.system_id, set_point, unit)
            .await?;

        info!(
            "Set {} target temperature to {}{}",
            self.entity_id, set_point, unit
        );
        self.coordinator.write(|tree| {
            tree.virtual_heater_mut(self.system_id)
                .map(|h| h.telemetry.current_set_point = Some(set_point))
        })?;
        Ok(())
    }

    /// Enable or disable the heater, then ask the engine to refresh the entity.
    ///
    /// Only `heat` and `off` are accepted; anything else is logged and
    /// rejected before the controller is contacted.
    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<(), ClimateError> {
        let enabled = match mode {
            HvacMode::Heat => true,
            HvacMode::Off => false,
            other => {
                error!("Unrecognized hvac mode: {}", other);
                return Err(ClimateError::UnsupportedHvacMode(other));
            }
        };

        self.coordinator
            .api()
            .set_heater_enable(self.bow_id, self.system_id, enabled)
            .await?;

        info!("Set {} hvac mode to {}", self.entity_id, mode);
        self.coordinator.write(|tree| {
            tree.virtual_heater_mut(self.system_id)
                .map(|h| h.telemetry.enabled = enabled)
        })?;

        self.write_state().await;
        Ok(())
    }

    pub async fn turn_on(&self) -> Result<(), ClimateError> {
        self.set_hvac_mode(HvacMode::Heat).await
    }

    pub async fn turn_off(&self) -> Result<(), ClimateError> {
        self.set_hvac_mode(HvacMode::Off).await
    }

    /// Publish the current projected state to the engine
    ///
    /// Failures are logged; the command that triggered the write has already
    /// taken effect.
    pub async fn write_state(&self) {
        let Some(to_engine) = &self.to_engine else {
            return;
        };

        let state = match self.state() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to project state of {}: {}", self.entity_id, e);
                return;
            }
        };
        let msg = FromIntegrationMessage::ClimateStateChanged {
            entity_id: self.entity_id.clone(),
            state: Box::new(state),
        };
        if let Err(e) = to_engine.send(msg).await {
            warn!("Failed to send ClimateStateChanged message: {}", e);
        }
    }

    fn attributes(
        &self,
        tree: &DeviceTree,
    ) -> Result<BTreeMap<String, serde_json::Value>, ModelError> {
        let heater = tree.virtual_heater(self.system_id)?;

        let mut attributes = BTreeMap::new();
        attributes.insert(
            "solar_set_point".to_string(),
            json!(heater.config.solar_set_point),
        );

        for &system_id in &self.heater_equipment_ids {
            let equipment = tree.heater_equipment(system_id)?;
            let prefix = format!("omni_heater_{}", equipment.config.name.to_lowercase());
            attributes.insert(
                format!("{prefix}_enabled"),
                json!(equipment.config.enabled),
            );
            attributes.insert(format!("{prefix}_system_id"), json!(system_id));
            attributes.insert(format!("{prefix}_bow_id"), json!(equipment.config.bow_id));
            attributes.insert(
                format!("{prefix}_state"),
                json!(equipment.telemetry.state.to_string()),
            );
            attributes.insert(
                format!("{prefix}_sensor_temp"),
                json!(equipment.telemetry.temp),
            );
        }

        Ok(attributes)
    }
}

fn temperature_unit(tree: &DeviceTree) -> TemperatureUnit {
    match tree.system.units {
        Units::Metric => TemperatureUnit::Celsius,
        Units::Standard => TemperatureUnit::Fahrenheit,
    }
}

fn water_temp(raw: i32) -> Option<i32> {
    (raw != NO_READING).then_some(raw)
}

fn hvac_mode(enabled: bool) -> HvacMode {
    if enabled { HvacMode::Heat } else { HvacMode::Off }
}

fn hvac_action(mode: HvacMode) -> HvacAction {
    if mode == HvacMode::Heat {
        HvacAction::Heating
    } else {
        HvacAction::Off
    }
}
