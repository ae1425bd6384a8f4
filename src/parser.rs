//! Row Parser
//!
//! Turns engine table output into rows. A line is data when it splits on `|`
//! into at least two cells and its first cell looks like an integer id.
//! Anything else (headers, prompts, diagnostics) is skipped. This is a
//! heuristic tuned to the engine's CLI output, not a general table reader.

use crate::config::MarkerConfig;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

lazy_static! {
    static ref KEY_PATTERN: Regex = Regex::new(r"^-?[0-9]+$").expect("static regex");
}

const SEPARATOR: char = '|';

/// Ordered textual field values. Field 0 is the join key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(pub Vec<String>);

impl Row {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(fields.into_iter().map(Into::into).collect())
    }

    pub fn key(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(position).map(String::as_str)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Snapshot of one relation taken at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    pub name: String,
    pub rows: Vec<Row>,
}

pub struct RowParser {
    discard_markers: Vec<String>,
}

impl RowParser {
    pub fn new(markers: &MarkerConfig) -> Self {
        Self {
            discard_markers: markers.discard.clone(),
        }
    }

    pub fn parse(&self, text: &str) -> Vec<Row> {
        let rows: Vec<Row> = text.lines().filter_map(|line| self.parse_line(line)).collect();
        debug!("Parsed {} data rows from {} lines", rows.len(), text.lines().count());
        rows
    }

    pub fn parse_relation(&self, name: &str, text: &str) -> Relation {
        Relation {
            name: name.to_string(),
            rows: self.parse(text),
        }
    }

    fn parse_line(&self, line: &str) -> Option<Row> {
        if self.discard_markers.iter().any(|m| line.contains(m.as_str())) {
            return None;
        }
        split_data_line(line).map(Row)
    }
}

/// True when `line` has the shape of a data row, regardless of markers
pub fn is_data_line(line: &str) -> bool {
    split_data_line(line).is_some()
}

fn split_data_line(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if !line.contains(SEPARATOR) {
        return None;
    }
    let cells = line.split(SEPARATOR).map(|c| c.trim().to_string()).collect_vec();
    if cells.len() < 2 || !KEY_PATTERN.is_match(&cells[0]) {
        return None;
    }
    Some(cells)
}

impl Default for RowParser {
    fn default() -> Self {
        Self::new(&MarkerConfig::default())
    }
}
