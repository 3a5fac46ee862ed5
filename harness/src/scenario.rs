//! Built-in scenarios and the comparison against their expected order.

use crate::config::HarnessConfig;
use crate::error::ScenarioError;
use crate::group::GroupControl;
use crate::process::ProcessOps;
use crate::runtime::Harness;
use crate::runtime::RunReport;
use crate::script::TaskEntry;
use crate::script::just_sleep;
use crate::script::restart_group;
use crate::script::sleep_check_suspend;
use crate::script::spawned_count;
use crate::script::stop_group;
use serde::Serialize;

/// A fixed table of task entries paired with the one acceptable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub entries: Vec<TaskEntry>,
    pub expected: Vec<usize>,
}

/// A scenario whose observed order matched the expected one.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub scenario: String,
    pub expected: Vec<usize>,
    pub report: RunReport,
}

impl Scenario {
    pub fn new(name: impl Into<String>, entries: Vec<TaskEntry>, expected: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            entries,
            expected,
        }
    }

    /// Both checkpoint-blocked workers wake together on resume and finish
    /// before the free-running sleeper.
    pub fn simple() -> Self {
        Self::new(
            "simple",
            vec![
                TaskEntry::Inline(stop_group(0)),
                TaskEntry::Spawned(sleep_check_suspend(0, 1)),
                TaskEntry::Inline(restart_group(2)),
                TaskEntry::Spawned(sleep_check_suspend(0, 1)),
                TaskEntry::Spawned(just_sleep(2)),
            ],
            vec![0, 1, 2],
        )
    }

    /// The worker that waited longest at the checkpoint still finishes
    /// after the one that passed it right after resume.
    pub fn simple_staggered() -> Self {
        Self::new(
            "simple_staggered",
            vec![
                TaskEntry::Inline(stop_group(0)),
                TaskEntry::Spawned(sleep_check_suspend(0, 3)),
                TaskEntry::Inline(restart_group(2)),
                TaskEntry::Spawned(sleep_check_suspend(0, 0)),
                TaskEntry::Spawned(just_sleep(4)),
            ],
            vec![1, 0, 2],
        )
    }

    /// Without any suspension, workers finish by total sleep time.
    pub fn no_stop() -> Self {
        Self::new(
            "no_stop",
            vec![
                TaskEntry::Spawned(sleep_check_suspend(0, 5)),
                TaskEntry::Spawned(sleep_check_suspend(0, 1)),
                TaskEntry::Spawned(sleep_check_suspend(0, 3)),
            ],
            vec![1, 2, 0],
        )
    }

    /// Worker 0 reaches its checkpoint after the group was stopped again,
    /// worker 1 slips through the first resume window and worker 2 blocks
    /// on the second stop.
    pub fn stop_after_restart() -> Self {
        Self::new(
            "stop_after_restart",
            vec![
                TaskEntry::Inline(stop_group(0)),
                TaskEntry::Spawned(sleep_check_suspend(6, 3)),
                TaskEntry::Spawned(sleep_check_suspend(2, 2)),
                TaskEntry::Inline(restart_group(1)),
                TaskEntry::Inline(stop_group(3)),
                TaskEntry::Spawned(sleep_check_suspend(0, 1)),
                TaskEntry::Inline(restart_group(4)),
            ],
            vec![1, 2, 0],
        )
    }

    pub fn worker_count(&self) -> usize {
        spawned_count(&self.entries)
    }

    /// Runs the scenario once on `harness` and checks the order.
    pub fn run<P: ProcessOps, G: GroupControl>(
        &self,
        harness: &mut Harness<P, G>,
    ) -> Result<ScenarioResult, ScenarioError> {
        tracing::info!(scenario = %self.name, workers = self.worker_count(), "running scenario");
        let report = harness
            .run(&self.entries)
            .map_err(|source| ScenarioError::Harness {
                scenario: self.name.clone(),
                source,
            })?;
        self.verify(report)
    }

    /// Compares a run's order against the expected one, element by element.
    pub fn verify(&self, report: RunReport) -> Result<ScenarioResult, ScenarioError> {
        if report.order != self.expected {
            return Err(ScenarioError::OrderMismatch {
                scenario: self.name.clone(),
                expected: self.expected.clone(),
                actual: report.order,
            });
        }
        Ok(ScenarioResult {
            scenario: self.name.clone(),
            expected: self.expected.clone(),
            report,
        })
    }
}

/// The four built-in scenarios, in the order they are run.
pub fn builtin_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::simple(),
        Scenario::simple_staggered(),
        Scenario::no_stop(),
        Scenario::stop_after_restart(),
    ]
}

/// Runs `scenarios` in order, each on a fresh forking harness with its own
/// gate. Stops at the first failure.
pub fn run_all(
    scenarios: &[Scenario],
    config: HarnessConfig,
) -> Result<Vec<ScenarioResult>, ScenarioError> {
    let mut results = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let mut harness =
            Harness::with_lock_gate(config).map_err(|source| ScenarioError::Harness {
                scenario: scenario.name.clone(),
                source,
            })?;
        let result = scenario.run(&mut harness)?;
        tracing::info!(scenario = %scenario.name, "scenario passed");
        results.push(result);
    }
    Ok(results)
}

pub fn run_builtin(config: HarnessConfig) -> Result<Vec<ScenarioResult>, ScenarioError> {
    run_all(&builtin_scenarios(), config)
}
