//! Device tree reported by an OmniLogic controller.
//!
//! The tree is the coordinator's cached view of every piece of equipment the
//! controller knows about, keyed by system id. Each record pairs the mostly
//! static `config` with the frequently refreshed `telemetry`.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use strum::Display;

/// Identifier the controller assigns to every piece of equipment.
pub type SystemId = i64;

/// Raw water temperature reported when the body of water has no valid reading.
pub const NO_READING: i32 = -1;

/// Unit system configured on the controller.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Units {
    #[default]
    Standard,
    Metric,
}

/// Controller-wide settings.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    #[serde(default)]
    pub units: Units,
}

/// Type tag the controller attaches to every device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OmniType {
    Backyard,
    Bow,
    VirtHeater,
    HeaterEquip,
    Filter,
    Pump,
    Relay,
    ColorLogicLight,
    Chlorinator,
    Sensor,
}

impl OmniType {
    /// Host platform a device of this type is exposed on.
    pub fn platform(self) -> &'static str {
        match self {
            OmniType::VirtHeater | OmniType::HeaterEquip => "climate",
            OmniType::Filter | OmniType::Pump | OmniType::Relay => "switch",
            OmniType::ColorLogicLight => "light",
            OmniType::Backyard | OmniType::Bow | OmniType::Chlorinator | OmniType::Sensor => {
                "sensor"
            }
        }
    }
}

/// A device record: configuration plus telemetry of matching type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<C, T> {
    pub config: C,
    pub telemetry: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackyardConfig {
    pub system_id: SystemId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackyardTelemetry {
    pub air_temp: i32,
}

/// Body of water (pool or spa).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowConfig {
    pub system_id: SystemId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowTelemetry {
    /// Measured water temperature, `-1` when the sensor has no reading.
    pub water_temp: i32,
}

/// The logical heater circuit of one body of water.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualHeaterConfig {
    pub system_id: SystemId,
    pub name: String,
    pub bow_id: SystemId,
    pub enabled: bool,
    pub min_temp: i32,
    pub max_temp: i32,
    pub solar_set_point: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualHeaterTelemetry {
    #[serde(default)]
    pub current_set_point: Option<i32>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaterType {
    Gas,
    HeatPump,
    Solar,
}

/// A physical heater (gas heater, heat pump, solar panel, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterEquipConfig {
    pub system_id: SystemId,
    pub name: String,
    pub bow_id: SystemId,
    pub enabled: bool,
    pub heater_type: HeaterType,
}

/// Operating state of a physical heater. Displays as its human-readable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeaterState {
    Off,
    On,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterEquipTelemetry {
    pub state: HeaterState,
    pub temp: i32,
}

/// Configuration shared by equipment this crate only passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentConfig {
    pub system_id: SystemId,
    pub name: String,
    #[serde(default)]
    pub bow_id: Option<SystemId>,
}

/// Any device the controller reports, tagged by its `omni_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "omni_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Device {
    Backyard(Record<BackyardConfig, BackyardTelemetry>),
    Bow(Record<BowConfig, BowTelemetry>),
    VirtHeater(Record<VirtualHeaterConfig, VirtualHeaterTelemetry>),
    HeaterEquip(Record<HeaterEquipConfig, HeaterEquipTelemetry>),
    Filter(Record<EquipmentConfig, serde_json::Value>),
    Pump(Record<EquipmentConfig, serde_json::Value>),
    Relay(Record<EquipmentConfig, serde_json::Value>),
    ColorLogicLight(Record<EquipmentConfig, serde_json::Value>),
    Chlorinator(Record<EquipmentConfig, serde_json::Value>),
    Sensor(Record<EquipmentConfig, serde_json::Value>),
}

impl Device {
    pub fn omni_type(&self) -> OmniType {
        match self {
            Device::Backyard(_) => OmniType::Backyard,
            Device::Bow(_) => OmniType::Bow,
            Device::VirtHeater(_) => OmniType::VirtHeater,
            Device::HeaterEquip(_) => OmniType::HeaterEquip,
            Device::Filter(_) => OmniType::Filter,
            Device::Pump(_) => OmniType::Pump,
            Device::Relay(_) => OmniType::Relay,
            Device::ColorLogicLight(_) => OmniType::ColorLogicLight,
            Device::Chlorinator(_) => OmniType::Chlorinator,
            Device::Sensor(_) => OmniType::Sensor,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Device::Backyard(r) => &r.config.name,
            Device::Bow(r) => &r.config.name,
            Device::VirtHeater(r) => &r.config.name,
            Device::HeaterEquip(r) => &r.config.name,
            Device::Filter(r)
            | Device::Pump(r)
            | Device::Relay(r)
            | Device::ColorLogicLight(r)
            | Device::Chlorinator(r)
            | Device::Sensor(r) => &r.config.name,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("No device with system id {0}")]
    MissingDevice(SystemId),

    #[error("Device {system_id} is a {found}, expected {expected}")]
    UnexpectedDeviceType {
        system_id: SystemId,
        expected: OmniType,
        found: OmniType,
    },

    #[error("Failed to read device snapshot {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse device snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The coordinator's last-known view of the controller.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTree {
    #[serde(default)]
    pub system: SystemSettings,

    #[serde(default)]
    pub devices: BTreeMap<SystemId, Device>,
}

impl DeviceTree {
    /// Load a device tree from a JSON snapshot file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ModelError::Io(path.as_ref().to_path_buf(), e))?;

        Ok(serde_json::from_str(&contents)?)
    }

    /// Iterate the devices exposed on the given host platform, in system id order.
    pub fn of_platform<'a>(
        &'a self,
        platform: &'a str,
    ) -> impl Iterator<Item = (SystemId, &'a Device)> + 'a {
        self.devices
            .iter()
            .filter(move |(_, device)| device.omni_type().platform() == platform)
            .map(|(id, device)| (*id, device))
    }

    fn get(&self, system_id: SystemId) -> Result<&Device, ModelError> {
        self.devices
            .get(&system_id)
            .ok_or(ModelError::MissingDevice(system_id))
    }

    fn get_mut(&mut self, system_id: SystemId) -> Result<&mut Device, ModelError> {
        self.devices
            .get_mut(&system_id)
            .ok_or(ModelError::MissingDevice(system_id))
    }

    pub fn bow(&self, system_id: SystemId) -> Result<&Record<BowConfig, BowTelemetry>, ModelError> {
        match self.get(system_id)? {
            Device::Bow(r) => Ok(r),
            other => Err(unexpected(system_id, OmniType::Bow, other)),
        }
    }

    pub fn virtual_heater(
        &self,
        system_id: SystemId,
    ) -> Result<&Record<VirtualHeaterConfig, VirtualHeaterTelemetry>, ModelError> {
        match self.get(system_id)? {
            Device::VirtHeater(r) => Ok(r),
            other => Err(unexpected(system_id, OmniType::VirtHeater, other)),
        }
    }

    pub fn virtual_heater_mut(
        &mut self,
        system_id: SystemId,
    ) -> Result<&mut Record<VirtualHeaterConfig, VirtualHeaterTelemetry>, ModelError> {
        match self.get_mut(system_id)? {
            Device::VirtHeater(r) => Ok(r),
            other => Err(unexpected(system_id, OmniType::VirtHeater, other)),
        }
    }

    pub fn heater_equipment(
        &self,
        system_id: SystemId,
    ) -> Result<&Record<HeaterEquipConfig, HeaterEquipTelemetry>, ModelError> {
        match self.get(system_id)? {
            Device::HeaterEquip(r) => Ok(r),
            other => Err(unexpected(system_id, OmniType::HeaterEquip, other)),
        }
    }
}

fn unexpected(system_id: SystemId, expected: OmniType, found: &Device) -> ModelError {
    ModelError::UnexpectedDeviceType {
        system_id,
        expected,
        found: found.omni_type(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let json = r#"{
            "system": { "units": "Metric" },
            "devices": {
                "3": {
                    "omni_type": "BOW",
                    "config": { "system_id": 3, "name": "Pool" },
                    "telemetry": { "water_temp": 26 }
                },
                "16": {
                    "omni_type": "VIRT_HEATER",
                    "config": {
                        "system_id": 16,
                        "name": "Heater",
                        "bow_id": 3,
                        "enabled": true,
                        "min_temp": 18,
                        "max_temp": 40,
                        "solar_set_point": 35
                    },
                    "telemetry": { "enabled": false }
                },
                "17": {
                    "omni_type": "HEATER_EQUIP",
                    "config": {
                        "system_id": 17,
                        "name": "Gas",
                        "bow_id": 3,
                        "enabled": true,
                        "heater_type": "GAS"
                    },
                    "telemetry": { "state": "PAUSE", "temp": 27 }
                },
                "20": {
                    "omni_type": "PUMP",
                    "config": { "system_id": 20, "name": "Jets", "bow_id": 3 },
                    "telemetry": { "speed": 60 }
                }
            }
        }"#;

        let tree: DeviceTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.system.units, Units::Metric);
        assert_eq!(tree.devices.len(), 4);

        let heater = tree.virtual_heater(16).unwrap();
        assert_eq!(heater.config.bow_id, 3);
        assert_eq!(heater.telemetry.current_set_point, None);

        let gas = tree.heater_equipment(17).unwrap();
        assert_eq!(gas.telemetry.state, HeaterState::Pause);
        assert_eq!(tree.devices[&20].omni_type(), OmniType::Pump);
        assert_eq!(tree.devices[&20].name(), "Jets");
    }

    #[test]
    fn test_units_default_to_standard() {
        let tree: DeviceTree = serde_json::from_str(r#"{ "devices": {} }"#).unwrap();
        assert_eq!(tree.system.units, Units::Standard);
    }

    #[test]
    fn test_of_platform_selects_climate_devices() {
        let tree = pool_tree(Units::Standard);
        let ids: Vec<SystemId> = tree.of_platform("climate").map(|(id, _)| id).collect();
        assert_eq!(ids, vec![HEATER_ID, GAS_ID, HEAT_PUMP_ID]);

        let sensors: Vec<SystemId> = tree.of_platform("sensor").map(|(id, _)| id).collect();
        assert_eq!(sensors, vec![BOW_ID]);
    }

    #[test]
    fn test_typed_lookup_errors() {
        let tree = pool_tree(Units::Standard);

        assert!(matches!(
            tree.virtual_heater(99),
            Err(ModelError::MissingDevice(99))
        ));
        assert!(matches!(
            tree.bow(HEATER_ID),
            Err(ModelError::UnexpectedDeviceType {
                system_id: HEATER_ID,
                expected: OmniType::Bow,
                found: OmniType::VirtHeater,
            })
        ));
    }

    #[test]
    fn test_heater_state_display() {
        assert_eq!(HeaterState::Off.to_string(), "Off");
        assert_eq!(HeaterState::Pause.to_string(), "Pause");
        assert_eq!(OmniType::HeaterEquip.to_string(), "HEATER_EQUIP");
    }

    #[test]
    fn test_demo_snapshot_parses() {
        let tree: DeviceTree =
            serde_json::from_str(include_str!("../../../../../demos/snapshot.json")).unwrap();
        let climates: Vec<SystemId> = tree.of_platform("climate").map(|(id, _)| id).collect();
        assert_eq!(climates, vec![16, 17, 18]);
        assert_eq!(
            tree.heater_equipment(18).unwrap().config.heater_type,
            HeaterType::Solar
        );
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let tree = pool_tree(Units::Metric);
        std::fs::write(&path, serde_json::to_string(&tree).unwrap()).unwrap();

        let loaded = DeviceTree::from_file(&path).unwrap();
        assert_eq!(loaded, tree);

        assert!(matches!(
            DeviceTree::from_file(dir.path().join("missing.json")),
            Err(ModelError::Io(_, _))
        ));
    }
}
