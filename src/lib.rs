pub mod config;
pub mod core;
pub mod errors;
pub mod runner;
pub mod scenarios;
pub mod scheduler;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::{LoadTestConfig, Profile};
pub use core::*;
pub use errors::{ConfigError, ConfigResult, IterationError, IterationResult, SetupError, SetupResult};
pub use runner::Runner;
pub use scenarios::{Behavior, BehaviorKind};
pub use scheduler::{RampSchedule, RampStage, ScenarioConfig, ScenarioScheduler};
