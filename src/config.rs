//! Simulator Configuration
//!
//! Everything that varied between the hand-written join wrappers lives here:
//! which engine binary to drive, the two-sided column schema used to validate
//! projections, and the marker strings that classify engine output lines.

use crate::error::{JoinError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_ENGINE_PATH: &str = "JOINSIM_ENGINE_PATH";
pub const ENV_ENGINE_ARGS: &str = "JOINSIM_ENGINE_ARGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub schema: JoinSchema,

    #[serde(default)]
    pub markers: MarkerConfig,

    /// Rendered in place of data lines when the join matched nothing
    #[serde(default = "default_no_rows_indicator")]
    pub no_rows_indicator: String,
}

/// How to reach the external SQL engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,

    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,

    /// Statement appended after the query so the engine's CLI terminates
    #[serde(default = "default_exit_command")]
    pub exit_command: String,
}

/// Columns exposed by each side of the join. Column 0 is the join key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSchema {
    #[serde(default = "default_left_columns")]
    pub left_columns: Vec<String>,

    #[serde(default = "default_right_columns")]
    pub right_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Lines containing any of these are dropped by the row parser
    #[serde(default = "default_discard_markers")]
    pub discard: Vec<String>,

    /// Any of these in a scan's output fails the whole scan
    #[serde(default = "default_failure_markers")]
    pub failure: Vec<String>,
}

fn default_no_rows_indicator() -> String {
    "NO_ROWS".to_string()
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("./build_debug/bin/observer")
}

fn default_engine_args() -> Vec<String> {
    vec!["-P".to_string(), "cli".to_string()]
}

fn default_exit_command() -> String {
    "exit;".to_string()
}

fn default_left_columns() -> Vec<String> {
    vec!["id".to_string(), "name".to_string()]
}

fn default_right_columns() -> Vec<String> {
    vec!["id".to_string(), "age".to_string()]
}

fn default_discard_markers() -> Vec<String> {
    vec!["SQL_SYNTAX".to_string(), "Command history saved".to_string()]
}

fn default_failure_markers() -> Vec<String> {
    vec!["Failed to parse sql".to_string(), "FAILURE".to_string()]
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            schema: JoinSchema::default(),
            markers: MarkerConfig::default(),
            no_rows_indicator: default_no_rows_indicator(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            args: default_engine_args(),
            exit_command: default_exit_command(),
        }
    }
}

impl Default for JoinSchema {
    fn default() -> Self {
        Self {
            left_columns: default_left_columns(),
            right_columns: default_right_columns(),
        }
    }
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            discard: default_discard_markers(),
            failure: default_failure_markers(),
        }
    }
}

impl SimulatorConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: SimulatorConfig = serde_json::from_str(&content)?;
        debug!("Loaded simulator config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Apply `JOINSIM_ENGINE_PATH` / `JOINSIM_ENGINE_ARGS` overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var(ENV_ENGINE_PATH) {
            self.engine.path = PathBuf::from(path);
        }
        if let Ok(args) = std::env::var(ENV_ENGINE_ARGS) {
            self.engine.args = args.split_whitespace().map(str::to_string).collect();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema.left_columns.is_empty() || self.schema.right_columns.is_empty() {
            return Err(JoinError::Config(
                "schema must declare at least the key column for both relations".to_string(),
            ));
        }
        if self.no_rows_indicator.contains('|') {
            return Err(JoinError::Config(
                "no_rows_indicator must not contain the column separator '|'".to_string(),
            ));
        }
        Ok(())
    }
}
