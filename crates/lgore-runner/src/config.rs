//! Runner configuration file.
//!
//! ```json
//! {
//!   "log": { "module_name": "busy", "log_path": "/tmp/log" },
//!   "lgore": { "ReserveCores": [0] },
//!   "workers": 2,
//!   "duration_secs": 10
//! }
//! ```
//!
//! Every field is optional; command-line flags take precedence.

use std::path::Path;

use anyhow::Context;
use lgore_core::LgoreConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub log: LogMeta,
    pub lgore: LgoreConfig,
    /// Number of busy workers; defaults to one per lgore.
    pub workers: Option<usize>,
    /// Stop after this many seconds instead of waiting for Ctrl+C.
    pub duration_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogMeta {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
}

pub fn load_config(path: &Path) -> anyhow::Result<RunnerConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let c: RunnerConfig = serde_json::from_str(
            r#"{
                "log": { "module_name": "busy", "log_path": "/tmp/log" },
                "lgore": { "OccupyAll": false, "ReserveCores": [0, 1] },
                "workers": 2,
                "duration_secs": 10
            }"#,
        )
        .unwrap();
        assert_eq!(c.log.module_name.as_deref(), Some("busy"));
        assert_eq!(c.lgore.reserve_cores, vec![0, 1]);
        assert_eq!(c.workers, Some(2));
        assert_eq!(c.duration_secs, Some(10));
    }

    #[test]
    fn empty_config_is_default() {
        let c: RunnerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(c.lgore, LgoreConfig::default());
        assert!(c.workers.is_none());
        assert!(c.log.log_path.is_none());
    }
}
