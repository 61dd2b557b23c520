pub mod api;
pub mod config;
pub mod engine;

pub use config::Config;
pub use config::LogLevel;
pub use engine::Engine;
pub use engine::EngineSettings;
pub use engine::SimError;
pub use engine::SimulationState;
