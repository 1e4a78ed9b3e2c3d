mod api;
mod climate;
mod config;
mod coordinator;
mod model;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod omnilogic;

use std::time::Duration;

use anyhow::Context;
pub use api::ApiError;
pub use api::DryRunApi;
pub use api::OmniApi;
pub use climate::ClimateError;
pub use climate::HeaterClimate;
pub use config::Config as OmniLogicConfig;
pub use coordinator::Coordinator;
use linkme::distributed_slice;
pub use model::Device;
pub use model::DeviceTree;
pub use model::ModelError;
pub use model::OmniType;
pub use model::SystemId;
pub use model::Units;
pub use omnilogic::OmniLogicIntegration;
use tracing::info;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_omnilogic(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let omnilogic_config = match &ctx.config.integrations.omnilogic {
        Some(c) if c.enabled => c,
        Some(_) => {
            info!("OmniLogic integration is disabled, skipping");
            return Ok(None);
        }
        None => return Ok(None),
    };

    let tree = DeviceTree::from_file(&omnilogic_config.snapshot)
        .context("Failed to load OmniLogic device snapshot")?;

    let mut integration = OmniLogicIntegration::new(DryRunApi, tree);
    if let Some(secs) = omnilogic_config.poll_interval_secs.filter(|s| *s > 0) {
        integration = integration
            .with_snapshot_polling(omnilogic_config.snapshot.clone(), Duration::from_secs(secs));
    }

    Ok(Some(Box::new(integration)))
}
