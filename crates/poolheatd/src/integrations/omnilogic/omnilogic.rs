use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::api::OmniApi;
use super::climate;
use super::climate::ClimateError;
use super::climate::HeaterClimate;
use super::coordinator::Coordinator;
use super::model::DeviceTree;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;

const NAME: &str = "omnilogic";

/// Type alias for the shared heater map, keyed by entity id
type HeatersMap<A> = Arc<HashMap<String, HeaterClimate<A>>>;

/// Where and how often to re-read the device tree
#[derive(Debug, Clone)]
struct SnapshotPolling {
    path: PathBuf,
    interval: Duration,
}

/// OmniLogic integration for poolheatd
///
/// Owns the coordinator for one controller and exposes its virtual heaters
/// as climate entities.
pub struct OmniLogicIntegration<A: OmniApi> {
    coordinator: Arc<Coordinator<A>>,
    heaters: HeatersMap<A>,
    polling: Option<SnapshotPolling>,
    to_engine: Option<FromIntegrationSender>,
    /// Handle to the background snapshot polling task
    poll_task: Option<JoinHandle<()>>,
}

impl<A: OmniApi + 'static> OmniLogicIntegration<A> {
    /// Create a new OmniLogic integration from a controller client and its
    /// last-known device tree
    pub fn new(api: A, tree: DeviceTree) -> Self {
        Self {
            coordinator: Arc::new(Coordinator::new(api, tree)),
            heaters: Arc::new(HashMap::new()),
            polling: None,
            to_engine: None,
            poll_task: None,
        }
    }

    /// Periodically reload the device tree from a snapshot file
    pub fn with_snapshot_polling(mut self, path: PathBuf, interval: Duration) -> Self {
        self.polling = Some(SnapshotPolling { path, interval });
        self
    }

    pub fn coordinator(&self) -> &Arc<Coordinator<A>> {
        &self.coordinator
    }

    /// Replace the cached device tree and republish every heater's state
    pub async fn refresh(&self, tree: DeviceTree) {
        self.coordinator.update(tree);
        publish_all(&self.heaters).await;
    }

    fn heater(&self, entity_id: &str) -> Result<&HeaterClimate<A>, Box<dyn Error + Send>> {
        self.heaters
            .get(entity_id)
            .ok_or_else(|| -> Box<dyn Error + Send> {
                Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Heater not found: {}", entity_id),
                ))
            })
    }

    /// Re-read the snapshot file on a fixed interval (background task)
    async fn poll_snapshot_task(
        polling: SnapshotPolling,
        coordinator: Arc<Coordinator<A>>,
        heaters: HeatersMap<A>,
    ) {
        let mut ticker = tokio::time::interval(polling.interval);
        // The first tick completes immediately; setup already loaded the tree
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let loaded = match tokio::fs::read_to_string(&polling.path).await {
                Ok(contents) => {
                    serde_json::from_str::<DeviceTree>(&contents).map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            match loaded {
                Ok(tree) => {
                    debug!("Reloaded device snapshot {}", polling.path.display());
                    coordinator.update(tree);
                }
                Err(e) => coordinator.update_failed(&e),
            }

            publish_all(&heaters).await;
        }
    }
}

/// Publish the state of every heater
async fn publish_all<A: OmniApi>(heaters: &HashMap<String, HeaterClimate<A>>) {
    for heater in heaters.values() {
        heater.write_state().await;
    }
}

fn boxed(e: ClimateError) -> Box<dyn Error + Send> {
    Box::new(e)
}

#[async_trait]
impl<A: OmniApi + 'static> Integration for OmniLogicIntegration<A> {
    fn name(&self) -> &str {
        NAME
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!("Setting up OmniLogic integration");

        let mut heaters = HashMap::new();
        for mut heater in climate::discover(&self.coordinator).map_err(boxed)? {
            heater.attach(tx.clone());

            let msg = FromIntegrationMessage::EntityDiscovered {
                entity_id: heater.entity_id().to_string(),
                integration_name: NAME.to_string(),
            };
            if let Err(e) = tx.send(msg).await {
                warn!("Failed to send EntityDiscovered message: {}", e);
            } else {
                info!("Registered entity: {}", heater.entity_id());
            }

            heater.write_state().await;
            heaters.insert(heater.entity_id().to_string(), heater);
        }
        self.heaters = Arc::new(heaters);
        self.to_engine = Some(tx);

        if let Some(polling) = self.polling.clone() {
            info!(
                "Polling device snapshot {} every {:?}",
                polling.path.display(),
                polling.interval
            );
            let coordinator = self.coordinator.clone();
            let heaters = self.heaters.clone();
            self.poll_task = Some(tokio::spawn(async move {
                Self::poll_snapshot_task(polling, coordinator, heaters).await;
            }));
        }

        info!(
            "OmniLogic integration ready with {} heater(s)",
            self.heaters.len()
        );
        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        let heater = self.heater(msg.entity_id())?;

        match msg {
            ToIntegrationMessage::ClimateSetTemperature { temperature, .. } => {
                heater.set_temperature(temperature).await.map_err(boxed)?;
                heater.write_state().await;
            }
            ToIntegrationMessage::ClimateSetHvacMode { hvac_mode, .. } => {
                heater.set_hvac_mode(hvac_mode).await.map_err(boxed)?;
            }
            ToIntegrationMessage::ClimateTurnOn { .. } => {
                heater.turn_on().await.map_err(boxed)?;
            }
            ToIntegrationMessage::ClimateTurnOff { .. } => {
                heater.turn_off().await.map_err(boxed)?;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("OmniLogic integration shutting down");

        if let Some(task) = self.poll_task.take() {
            task.abort();
        }

        if let Some(tx) = self.to_engine.take() {
            for entity_id in self.heaters.keys() {
                let msg = FromIntegrationMessage::EntityRemoved {
                    entity_id: entity_id.clone(),
                };
                if let Err(e) = tx.send(msg).await {
                    warn!("Failed to send EntityRemoved message: {}", e);
                }
            }
        }
        self.heaters = Arc::new(HashMap::new());

        Ok(())
    }
}
