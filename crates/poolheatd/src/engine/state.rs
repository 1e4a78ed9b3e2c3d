use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumString;

/// Unit a climate entity reports and accepts temperatures in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum TemperatureUnit {
    #[serde(rename = "°C")]
    #[strum(serialize = "°C")]
    Celsius,

    #[serde(rename = "°F")]
    #[strum(serialize = "°F")]
    Fahrenheit,
}

/// Operating mode requested for a climate entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Auto,
    Dry,
    FanOnly,
}

/// What a climate entity is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HvacAction {
    Off,
    Heating,
    Idle,
    Cooling,
}

/// Coarse on/off status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OnOff {
    On,
    Off,
}

impl From<bool> for OnOff {
    fn from(on: bool) -> Self {
        if on { OnOff::On } else { OnOff::Off }
    }
}

/// Optional capabilities a climate entity advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimateFeature {
    TargetTemperature,
    TurnOff,
    TurnOn,
}

/// Projected state of a climate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateState {
    /// Human-readable name
    pub name: String,

    /// Whether the last refresh of the backing device succeeded
    pub available: bool,

    pub temperature_unit: TemperatureUnit,
    pub min_temp: i32,
    pub max_temp: i32,

    /// Requested set point, if the device reports one
    pub target_temperature: Option<i32>,

    /// Measured temperature, if a valid reading exists
    pub current_temperature: Option<i32>,

    pub hvac_mode: HvacMode,
    pub hvac_action: HvacAction,
    pub hvac_modes: Vec<HvacMode>,
    pub current_operation: OnOff,
    pub supported_features: Vec<ClimateFeature>,

    /// Integration-specific extra attributes
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub climates: HashMap<String, ClimateState>,
}
