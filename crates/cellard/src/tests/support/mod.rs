//! Shared doubles and harnesses for the daemon test suites.

mod client;
mod config_loader;
mod process_world;
mod reporter;
mod world;

pub use client::Client;
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use process_world::ProcessTestWorld;
pub use reporter::{BootstrapPhase, RecordingHealthReporter, WorkerChange};
pub use world::{TestWorld, world};
