pub mod aggregate;
pub mod guard;
pub mod orchestrator;
pub mod stats;
pub mod tracker;

pub use guard::RunGuard;
pub use orchestrator::{EngineSettings, Orchestrator};
pub use stats::PassStats;
