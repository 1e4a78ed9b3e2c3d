pub mod api;
pub mod config;
mod engine;
pub mod integrations;

pub use config::Config;
pub use config::LogLevel;
pub use engine::ClimateState;
pub use engine::Engine;
pub use engine::EngineError;
pub use engine::HvacMode;
pub use engine::State;
pub use engine::state::HvacAction;
pub use engine::state::TemperatureUnit;
