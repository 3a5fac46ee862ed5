//! Multi-process ordering harness for group suspend/resume primitives.
//!
//! A run realizes a list of task entries: inline entries execute in the
//! orchestrating process, every other entry becomes its own worker process.
//! A watchdog process bounds the run, and the collector turns child exit
//! notifications into the order in which workers completed. Scenarios pair
//! an entry table with the one order a correct primitive can produce.

pub mod collector;
pub mod config;
pub mod error;
pub mod group;
pub mod process;
pub mod runtime;
pub mod scenario;
pub mod script;
pub mod spawner;
pub mod watchdog;

#[cfg(test)]
mod test_support;

pub use config::HarnessConfig;
pub use error::GroupError;
pub use error::HarnessError;
pub use error::ScenarioError;
pub use group::GroupControl;
pub use group::LockGate;
pub use process::ForkProcessOps;
pub use process::ProcessOps;
pub use runtime::Harness;
pub use runtime::RunReport;
pub use scenario::Scenario;
pub use scenario::ScenarioResult;
pub use script::TaskEntry;
pub use script::TaskScript;
