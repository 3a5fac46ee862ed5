//! Timing configuration shared by every run.

use serde::Deserialize;
use serde::Serialize;
use std::time::Duration;

/// Length of one script quantum in the built-in scenarios.
pub const DEFAULT_QUANTUM_MS: u64 = 100;

/// How long the watchdog sleeps before terminating the workers.
pub const DEFAULT_DEADLINE_MS: u64 = 1000;

/// Timing knobs for a harness run.
///
/// Scripts are written in quanta; `quantum_ms` turns them into wall-clock
/// time. The watchdog deadline is measured from the moment the watchdog is
/// spawned, i.e. after every inline entry has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub quantum_ms: u64,
    pub deadline_ms: u64,
}

impl HarnessConfig {
    pub fn with_quantum_ms(mut self, quantum_ms: u64) -> Self {
        self.quantum_ms = quantum_ms;
        self
    }

    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn quantum(&self) -> Duration {
        Duration::from_millis(self.quantum_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            quantum_ms: DEFAULT_QUANTUM_MS,
            deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_timing() {
        let config = HarnessConfig::default();
        assert_eq!(config.quantum(), Duration::from_millis(100));
        assert_eq!(config.deadline(), Duration::from_secs(1));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: HarnessConfig = serde_json::from_str(r#"{"deadline_ms": 250}"#).unwrap();
        assert_eq!(config, HarnessConfig::default().with_deadline_ms(250));
    }
}
