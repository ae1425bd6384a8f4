//! Relation Scanner
//!
//! The simulator never talks to the SQL engine directly; it asks a
//! `RelationScanner` for the textual output of `SELECT * FROM <relation>`.
//! `ProcessScanner` drives the real engine CLI, `InMemoryScanner` serves
//! canned tables.

use crate::config::{EngineConfig, MarkerConfig};
use crate::error::{JoinError, Result};
use crate::parser::is_data_line;
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[async_trait]
pub trait RelationScanner: Send + Sync {
    /// Raw tabular text for every row of `relation`
    async fn scan(&self, relation: &str) -> Result<String>;
}

/// Captured result of one engine invocation
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub status_code: Option<i32>,
}

impl EngineOutput {
    pub fn success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Runs the engine binary once per statement, feeding it on stdin
pub struct ProcessScanner {
    engine: EngineConfig,
}

impl ProcessScanner {
    pub fn new(engine: EngineConfig) -> Self {
        Self { engine }
    }

    /// Execute one statement and capture everything the engine printed
    pub async fn execute(&self, sql: &str) -> Result<EngineOutput> {
        debug!("Invoking {} with: {}", self.engine.path.display(), sql);
        self.run_script(&format!("{}\n{}\n", sql, self.engine.exit_command))
            .await
    }

    /// Feed a whole script to the engine verbatim. No exit command is
    /// appended; the script is expected to end the session itself.
    pub async fn run_script(&self, script: &str) -> Result<EngineOutput> {
        let mut child = Command::new(&self.engine.path)
            .args(&self.engine.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // The engine may exit before reading all of its input
            if let Err(e) = stdin.write_all(script.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
                debug!("Engine closed stdin early");
            }
        }

        let output = child.wait_with_output().await?;
        Ok(EngineOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status_code: output.status.code(),
        })
    }
}

#[async_trait]
impl RelationScanner for ProcessScanner {
    async fn scan(&self, relation: &str) -> Result<String> {
        let output = self
            .execute(&format!("SELECT * FROM {};", relation))
            .await
            .map_err(|e| JoinError::scan_failure(relation, format!("engine invocation failed: {}", e)))?;

        if !output.success() {
            warn!("Engine exited with {:?} while scanning {}", output.status_code, relation);
            let reason = match output.status_code {
                Some(code) => format!("engine exited with status {}", code),
                None => "engine terminated by signal".to_string(),
            };
            return Err(JoinError::scan_failure(relation, reason));
        }

        info!("Scanned {} ({} bytes)", relation, output.stdout.len());
        Ok(output.stdout)
    }
}

/// Serves fixed text per relation name
#[derive(Debug, Clone, Default)]
pub struct InMemoryScanner {
    tables: HashMap<String, String>,
}

impl InMemoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, relation: impl Into<String>, text: impl Into<String>) -> Self {
        self.tables.insert(relation.into(), text.into());
        self
    }
}

#[async_trait]
impl RelationScanner for InMemoryScanner {
    async fn scan(&self, relation: &str) -> Result<String> {
        self.tables
            .get(relation)
            .cloned()
            .ok_or_else(|| JoinError::scan_failure(relation, "relation not found"))
    }
}

/// Reject scan output that cannot be a table: blank text, or a non-data line
/// carrying one of the configured failure markers. Data rows are never
/// checked, so a field value may contain a marker string.
pub fn verify_scan_output(relation: &str, text: &str, markers: &MarkerConfig) -> Result<()> {
    if text.trim().is_empty() {
        return Err(JoinError::scan_failure(relation, "engine returned no output"));
    }
    let marker = text
        .lines()
        .filter(|line| !is_data_line(line))
        .find_map(|line| markers.failure.iter().find(|m| line.contains(m.as_str())));
    if let Some(marker) = marker {
        return Err(JoinError::scan_failure(
            relation,
            format!("engine output contains failure marker '{}'", marker),
        ));
    }
    Ok(())
}
