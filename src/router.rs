//! Statement Router
//!
//! Decides what the binary does with its input: simulate a join, forward a
//! plain statement to the engine, print the comma-join rewrite, or
//! preprocess a whole script file before handing it to the engine.
//! Results go to a caller-supplied writer and the return value is the
//! process exit status.

use crate::error::{JoinError, Result};
use crate::extractor::QueryExtractor;
use crate::scanner::{EngineOutput, ProcessScanner};
use crate::simulator::JoinSimulator;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};

const COMMENT_PREFIX: &str = "--";

#[derive(Debug, Clone, Copy)]
pub struct RouteOptions {
    /// Print outcomes and errors as JSON objects
    pub json: bool,
    /// Forward non-join statements to the engine instead of reporting them
    pub passthrough: bool,
    /// Print rewritten SQL instead of executing anything
    pub rewrite: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            json: false,
            passthrough: true,
            rewrite: false,
        }
    }
}

pub async fn run_statement<W: Write>(
    simulator: &JoinSimulator<ProcessScanner>,
    sql: &str,
    options: RouteOptions,
    out: &mut W,
) -> Result<i32> {
    let sql = sql.trim();
    if sql.is_empty() {
        return report(&JoinError::NotAJoinQuery { query: String::new() }, options, out);
    }
    info!("Query: {}", sql);

    if options.rewrite {
        return match simulator.extract(sql) {
            Ok(spec) => {
                writeln!(out, "{}", spec.cross_product_sql())?;
                Ok(0)
            }
            Err(e) => report(&e, options, out),
        };
    }

    match simulator.run(sql).await {
        Ok(outcome) => {
            if options.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
            } else {
                writeln!(out, "{}", outcome.output.render(&simulator.config().no_rows_indicator))?;
            }
            Ok(0)
        }
        Err(JoinError::NotAJoinQuery { .. }) if options.passthrough => {
            info!("Not a join query, forwarding to engine");
            match simulator.scanner().execute(sql).await {
                Ok(output) => forward(&output, out),
                Err(e) => report(&e, options, out),
            }
        }
        Err(e) => report(&e, options, out),
    }
}

/// Rewrite every join line of the script at `path` into its comma-join form
/// and run the result through the engine. With `rewrite` set the script is
/// printed instead.
pub async fn run_script_file<W: Write>(
    simulator: &JoinSimulator<ProcessScanner>,
    path: &Path,
    options: RouteOptions,
    out: &mut W,
) -> Result<i32> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!("Cannot read script {}: {}", path.display(), e);
            return report(&e.into(), options, out);
        }
    };
    let script = rewrite_script(&text, simulator.extractor());

    if options.rewrite {
        write!(out, "{}", script)?;
        return Ok(0);
    }

    info!("Running preprocessed script {} through the engine", path.display());
    match simulator.scanner().run_script(&script).await {
        Ok(output) => forward(&output, out),
        Err(e) => report(&e, options, out),
    }
}

/// Line-by-line preprocessing: blank and `--` comment lines are kept, a
/// line holding a supported join becomes `SELECT <fields> FROM a, b;`, and
/// everything else is copied unchanged. Lines are trimmed.
pub fn rewrite_script(text: &str, extractor: &QueryExtractor) -> String {
    let mut script = String::with_capacity(text.len());
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(COMMENT_PREFIX) {
            script.push_str(line);
        } else if let Some(spec) = extractor.extract(line) {
            let rewritten = spec.cross_product_sql();
            debug!("Rewrote '{}' -> '{}'", line, rewritten);
            script.push_str(&rewritten);
        } else {
            script.push_str(line);
        }
        script.push('\n');
    }
    script
}

fn forward<W: Write>(output: &EngineOutput, out: &mut W) -> Result<i32> {
    write!(out, "{}", output.stdout)?;
    if !output.stderr.is_empty() {
        eprint!("{}", output.stderr);
    }
    Ok(output.status_code.unwrap_or(1))
}

fn report<W: Write>(e: &JoinError, options: RouteOptions, out: &mut W) -> Result<i32> {
    error!("{}", e);
    if options.json {
        let body = json!({ "error": e.indicator(), "message": e.to_string() });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else {
        writeln!(out, "{}", e.indicator())?;
    }
    Ok(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, SimulatorConfig};

    const JOIN: &str = "SELECT a.name FROM a INNER JOIN b ON a.id = b.id;";

    fn shell_simulator(script: &str) -> JoinSimulator<ProcessScanner> {
        let engine = EngineConfig {
            path: "/bin/sh".into(),
            args: vec!["-c".to_string(), script.to_string()],
            exit_command: "exit;".to_string(),
        };
        let config = SimulatorConfig {
            engine: engine.clone(),
            ..SimulatorConfig::default()
        };
        JoinSimulator::new(config, ProcessScanner::new(engine))
    }

    async fn route(sim: &JoinSimulator<ProcessScanner>, sql: &str, options: RouteOptions) -> (i32, String) {
        let mut out = Vec::new();
        let code = run_statement(sim, sql, options, &mut out).await.unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_join_is_simulated() {
        let sim = shell_simulator("cat >/dev/null; printf 'id | name\\n1 | x\\n2 | y\\n'");
        let (code, out) = route(&sim, JOIN, RouteOptions::default()).await;
        assert_eq!(code, 0);
        assert_eq!(out, "x\ny\n");
    }

    #[tokio::test]
    async fn test_non_join_is_forwarded_with_exit_status() {
        let sim = shell_simulator("cat; exit 4");
        let (code, out) = route(&sim, "SELECT * FROM a;", RouteOptions::default()).await;
        assert_eq!(code, 4);
        assert_eq!(out, "SELECT * FROM a;\nexit;\n");
    }

    #[tokio::test]
    async fn test_no_passthrough_prints_indicator() {
        let sim = shell_simulator("cat");
        let options = RouteOptions {
            passthrough: false,
            ..RouteOptions::default()
        };
        let (code, out) = route(&sim, "SELECT * FROM a;", options).await;
        assert_eq!(code, 1);
        assert_eq!(out, "NOT_A_JOIN_QUERY\n");
    }

    #[tokio::test]
    async fn test_empty_input_is_not_a_join() {
        let (code, out) = route(&shell_simulator("cat"), "   ", RouteOptions::default()).await;
        assert_eq!(code, 1);
        assert_eq!(out, "NOT_A_JOIN_QUERY\n");
    }

    #[tokio::test]
    async fn test_rewrite_prints_cross_product() {
        let options = RouteOptions {
            rewrite: true,
            ..RouteOptions::default()
        };
        let (code, out) = route(&shell_simulator("exit 9"), JOIN, options).await;
        assert_eq!(code, 0);
        assert_eq!(out, "SELECT a.name FROM a, b;\n");
    }

    #[tokio::test]
    async fn test_json_errors_are_objects() {
        let options = RouteOptions {
            json: true,
            ..RouteOptions::default()
        };
        let sim = shell_simulator("cat >/dev/null; printf 'id | name\\n1 | x\\n'");

        let (code, out) = route(&sim, "SELECT a.age FROM a INNER JOIN b ON a.id = b.id", options).await;
        assert_eq!(code, 1);
        let body: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(body["error"], "FAILURE");
        assert!(body["message"].as_str().unwrap().contains("a.age"));

        let failing = shell_simulator("exit 2");
        let (code, out) = route(&failing, JOIN, options).await;
        assert_eq!(code, 1);
        let body: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(body["error"], "SCAN_FAILURE");
    }

    #[tokio::test]
    async fn test_json_success_is_outcome() {
        let options = RouteOptions {
            json: true,
            ..RouteOptions::default()
        };
        let sim = shell_simulator("cat >/dev/null; printf '1 | x\\n'");
        let (code, out) = route(&sim, JOIN, options).await;
        assert_eq!(code, 0);
        let body: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(body["matched_rows"], 1);
        assert_eq!(body["output"]["lines"][0], "x");
    }

    #[test]
    fn test_rewrite_script_lines() {
        let extractor = QueryExtractor::new(SimulatorConfig::default().schema);
        let text = "-- seed\n\n  SELECT * FROM a INNER JOIN b ON a.id = b.id;  \nINSERT INTO a VALUES (1, 'x');\nexit;\n";
        assert_eq!(
            rewrite_script(text, &extractor),
            "-- seed\n\nSELECT * FROM a, b;\nINSERT INTO a VALUES (1, 'x');\nexit;\n"
        );
    }

    fn script_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", text).unwrap();
        file
    }

    #[tokio::test]
    async fn test_script_file_runs_rewritten_script() {
        let file = script_file("-- join\nselect b.age from a inner join b on a.id = b.id\nexit;\n");
        let sim = shell_simulator("cat; exit 3");

        let mut out = Vec::new();
        let code = run_script_file(&sim, file.path(), RouteOptions::default(), &mut out)
            .await
            .unwrap();
        assert_eq!(code, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "-- join\nSELECT b.age FROM a, b;\nexit;\n"
        );
    }

    #[tokio::test]
    async fn test_script_file_rewrite_only() {
        let file = script_file("SELECT * FROM a INNER JOIN b ON a.id = b.id\n");
        let options = RouteOptions {
            rewrite: true,
            ..RouteOptions::default()
        };

        let mut out = Vec::new();
        let code = run_script_file(&shell_simulator("exit 9"), file.path(), options, &mut out)
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8(out).unwrap(), "SELECT * FROM a, b;\n");
    }

    #[tokio::test]
    async fn test_missing_script_file_is_reported() {
        let mut out = Vec::new();
        let code = run_script_file(
            &shell_simulator("cat"),
            Path::new("/nonexistent/joinsim/script.sql"),
            RouteOptions::default(),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(code, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "INTERNAL_ERROR\n");
    }
}
