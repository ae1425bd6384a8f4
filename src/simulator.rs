//! Join Simulator
//!
//! Runs the whole pipeline for one statement:
//! extract -> scan left -> scan right -> parse -> join -> project.
//! Every stage runs to completion before the next starts, and nothing is
//! kept between calls to `run`.

use crate::config::SimulatorConfig;
use crate::error::{JoinError, Result};
use crate::extractor::{JoinSpec, QueryExtractor};
use crate::join::nested_loop_join;
use crate::parser::{Relation, RowParser};
use crate::projection::{project, FormattedOutput};
use crate::scanner::{verify_scan_output, RelationScanner};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of one simulated join
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub run_id: Uuid,
    pub left_relation: String,
    pub right_relation: String,
    pub condition: String,
    pub projection: String,
    pub left_rows: usize,
    pub right_rows: usize,
    pub matched_rows: usize,
    pub output: FormattedOutput,
    pub execution_time_ms: u64,
}

pub struct JoinSimulator<S: RelationScanner> {
    config: SimulatorConfig,
    extractor: QueryExtractor,
    parser: RowParser,
    scanner: S,
}

impl<S: RelationScanner> JoinSimulator<S> {
    pub fn new(config: SimulatorConfig, scanner: S) -> Self {
        Self {
            extractor: QueryExtractor::new(config.schema.clone()),
            parser: RowParser::new(&config.markers),
            config,
            scanner,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    pub fn extractor(&self) -> &QueryExtractor {
        &self.extractor
    }

    /// Recognize `sql` without executing it
    pub fn extract(&self, sql: &str) -> Result<JoinSpec> {
        self.extractor.extract(sql).ok_or_else(|| JoinError::NotAJoinQuery {
            query: sql.trim().to_string(),
        })
    }

    pub async fn run(&self, sql: &str) -> Result<QueryOutcome> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id, sql)
            .instrument(info_span!("join_run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid, sql: &str) -> Result<QueryOutcome> {
        let start_time = std::time::Instant::now();
        let spec = self.extract(sql)?;

        if let Err(e) = spec.projection.validate() {
            warn!("Rejecting query before scanning: {}", e);
            return Err(e);
        }

        info!(
            "Simulating {} INNER JOIN {} ON {}",
            spec.left_relation, spec.right_relation, spec.condition_text
        );

        let left = self.scan_relation(&spec.left_relation).await?;
        let right = self.scan_relation(&spec.right_relation).await?;

        let joined = nested_loop_join(&left.rows, &right.rows);
        let output = project(&joined, &spec.projection)?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Join complete: {} x {} rows -> {} matches in {}ms",
            left.rows.len(),
            right.rows.len(),
            joined.len(),
            execution_time_ms
        );

        Ok(QueryOutcome {
            run_id,
            projection: spec.projection.label(),
            left_rows: left.rows.len(),
            right_rows: right.rows.len(),
            matched_rows: joined.len(),
            output,
            execution_time_ms,
            left_relation: spec.left_relation,
            right_relation: spec.right_relation,
            condition: spec.condition_text,
        })
    }

    async fn scan_relation(&self, name: &str) -> Result<Relation> {
        let text = self.scanner.scan(name).await?;
        verify_scan_output(name, &text, &self.config.markers)?;
        let relation = self.parser.parse_relation(name, &text);
        info!("Relation {}: {} rows", name, relation.rows.len());
        Ok(relation)
    }
}
