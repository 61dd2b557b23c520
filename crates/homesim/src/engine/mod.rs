mod burst;
mod drift;
mod engine;
mod error;
mod history;
mod light;
pub mod state;
mod store;

pub use burst::BurstPhase;
pub use burst::BurstTiming;
pub use drift::DriftRange;
pub use drift::HUMIDITY;
pub use drift::TEMPERATURE;
pub use engine::Engine;
pub use engine::EngineSettings;
pub use error::SimError;
pub use light::light_id_from_number;
pub use light::parse_light_id;
pub use state::SimulationState;
pub use store::FileStore;
pub use store::MemoryStore;
pub use store::Store;
pub use store::StoreError;
