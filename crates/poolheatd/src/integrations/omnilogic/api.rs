use std::error::Error;

use async_trait::async_trait;
use tracing::info;

use super::model::SystemId;
use crate::engine::state::TemperatureUnit;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Controller rejected command: {0}")]
    Rejected(String),

    #[error("Controller unreachable: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),
}

/// Commands accepted by an OmniLogic controller
///
/// This trait allows for mocking the controller for testing purposes
#[async_trait]
pub trait OmniApi: Send + Sync {
    /// Set the target temperature of a heater, in the given unit
    async fn set_heater(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        temperature: i32,
        unit: TemperatureUnit,
    ) -> Result<(), ApiError>;

    /// Enable or disable a heater
    async fn set_heater_enable(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        enabled: bool,
    ) -> Result<(), ApiError>;
}

/// Controller client that only logs the commands it is given
///
/// Used when the daemon runs from a device snapshot rather than a live
/// controller.
#[derive(Debug, Default)]
pub struct DryRunApi;

#[async_trait]
impl OmniApi for DryRunApi {
    async fn set_heater(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        temperature: i32,
        unit: TemperatureUnit,
    ) -> Result<(), ApiError> {
        info!(
            "[dry-run] set_heater bow={} heater={} temperature={}{}",
            bow_id, system_id, temperature, unit
        );
        Ok(())
    }

    async fn set_heater_enable(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        enabled: bool,
    ) -> Result<(), ApiError> {
        info!(
            "[dry-run] set_heater_enable bow={} heater={} enabled={}",
            bow_id, system_id, enabled
        );
        Ok(())
    }
}

/// A command recorded by [`MockOmniApi`]
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    SetHeater {
        bow_id: SystemId,
        system_id: SystemId,
        temperature: i32,
        unit: TemperatureUnit,
    },
    SetHeaterEnable {
        bow_id: SystemId,
        system_id: SystemId,
        enabled: bool,
    },
}

/// How a [`MockOmniApi`] fails every command
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockFailure {
    Rejected(String),
    Unreachable(String),
}

/// Mock controller for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockOmniApi {
    pub calls: std::sync::Mutex<Vec<ApiCall>>,
    pub fail_with: Option<MockFailure>,
}

#[cfg(test)]
impl MockOmniApi {
    /// Create a mock controller that accepts every command
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock controller that rejects every command
    pub fn failing(reason: &str) -> Self {
        Self {
            calls: Default::default(),
            fail_with: Some(MockFailure::Rejected(reason.to_string())),
        }
    }

    /// Create a mock controller that cannot be reached
    pub fn unreachable(reason: &str) -> Self {
        Self {
            calls: Default::default(),
            fail_with: Some(MockFailure::Unreachable(reason.to_string())),
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ApiCall) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        match &self.fail_with {
            Some(MockFailure::Rejected(reason)) => Err(ApiError::Rejected(reason.clone())),
            Some(MockFailure::Unreachable(reason)) => Err(ApiError::Transport(Box::new(
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, reason.clone()),
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl OmniApi for MockOmniApi {
    async fn set_heater(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        temperature: i32,
        unit: TemperatureUnit,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::SetHeater {
            bow_id,
            system_id,
            temperature,
            unit,
        })
    }

    async fn set_heater_enable(
        &self,
        bow_id: SystemId,
        system_id: SystemId,
        enabled: bool,
    ) -> Result<(), ApiError> {
        self.record(ApiCall::SetHeaterEnable {
            bow_id,
            system_id,
            enabled,
        })
    }
}
