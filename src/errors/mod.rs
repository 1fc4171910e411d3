//! Error types for the load generator
//!
//! Two families of failure exist:
//! - [`ConfigError`]: raised once at startup, halts the run before any traffic
//! - [`IterationError`]: aborts only the current VU iteration; the scheduler
//!   starts a fresh iteration for that VU slot on its next loop
//!
//! [`SetupError`] wraps either of them when they occur before traffic starts
//! (a sitemap crawl failing during setup is fatal for the run).

pub mod config_error;
pub mod iteration_error;
pub mod setup_error;

pub use config_error::{ConfigError, ConfigResult};
pub use iteration_error::{IterationError, IterationResult};
pub use setup_error::{SetupError, SetupResult};
