//! Configuration for an lgore [`Environment`](crate::Environment).
//!
//! Read from JSON, either standalone or embedded in a larger config file.
//! Both `snake_case` and the `PascalCase` field names are accepted:
//!
//! ```json
//! { "occupy_all": false, "reserve_cores": [0] }
//! { "OccupyAll": false, "ReserveCores": [0, 1] }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LgoreConfig {
    /// Pre-occupy every lgore at startup. Accepted but not acted on yet.
    #[serde(alias = "OccupyAll")]
    pub occupy_all: bool,

    /// Ordinals into the process's allowed core set that are kept out of the
    /// lgore pool (for the async runtime, I/O threads, ...). At least one is
    /// required. Ordinal `i` is the `i`-th allowed core, not core id `i`.
    #[serde(alias = "ReserveCores")]
    pub reserve_cores: Vec<usize>,
}

impl Default for LgoreConfig {
    /// Reserve the first allowed core, do not pre-occupy.
    fn default() -> Self {
        Self { occupy_all: false, reserve_cores: vec![0] }
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<LgoreConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: LgoreConfig =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}
