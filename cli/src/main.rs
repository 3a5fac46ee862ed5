//! Runs the built-in group suspend/resume scenarios.
//!
//! Each passed scenario is printed to stdout as one JSON line. The process
//! exits non-zero on the first scenario that fails.

use group_harness::HarnessConfig;
use group_harness::scenario::run_builtin;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = HarnessConfig::default();
    tracing::info!(
        quantum_ms = config.quantum_ms,
        deadline_ms = config.deadline_ms,
        "running built-in scenarios"
    );

    let results = run_builtin(config)?;
    for result in &results {
        println!("{}", serde_json::to_string(result)?);
    }

    tracing::info!(passed = results.len(), "all scenarios passed");
    Ok(())
}
