//! Projection / Formatter
//!
//! Renders joined rows according to a resolved `ProjectionSpec`.

use crate::error::Result;
use crate::extractor::{ProjectionSpec, ResolvedField, Side};
use crate::join::JoinedRow;
use itertools::Itertools;
use serde::Serialize;

pub const COLUMN_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "lines", rename_all = "snake_case")]
pub enum FormattedOutput {
    Lines(Vec<String>),
    /// The join ran and matched nothing
    NoRows,
}

impl FormattedOutput {
    pub fn lines(&self) -> &[String] {
        match self {
            FormattedOutput::Lines(lines) => lines,
            FormattedOutput::NoRows => &[],
        }
    }

    pub fn render(&self, no_rows_indicator: &str) -> String {
        match self {
            FormattedOutput::Lines(lines) => lines.join("\n"),
            FormattedOutput::NoRows => no_rows_indicator.to_string(),
        }
    }
}

fn field_value<'a>(row: &'a JoinedRow, field: &ResolvedField) -> &'a str {
    let side = match field.side {
        Side::Left => &row.left,
        Side::Right => &row.right,
    };
    side.get(field.position).unwrap_or_default()
}

/// An invalid projection fails before the rows are looked at, so it is
/// reported even when the join produced nothing.
pub fn project(rows: &[JoinedRow], spec: &ProjectionSpec) -> Result<FormattedOutput> {
    spec.validate()?;

    if rows.is_empty() {
        return Ok(FormattedOutput::NoRows);
    }

    let lines = match spec {
        ProjectionSpec::All => rows.iter().map(|row| row.fields().join(COLUMN_SEPARATOR)).collect(),
        ProjectionSpec::SingleField(field) => rows.iter().map(|row| field_value(row, field).to_string()).collect(),
        ProjectionSpec::Fields(fields) => rows
            .iter()
            .map(|row| fields.iter().map(|f| field_value(row, f)).join(COLUMN_SEPARATOR))
            .collect(),
        ProjectionSpec::Invalid { .. } => unreachable!("handled above"),
    };

    Ok(FormattedOutput::Lines(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JoinError;
    use crate::join::nested_loop_join;
    use crate::parser::Row;

    fn seed_join() -> Vec<JoinedRow> {
        let left = vec![Row::new(["11", "A"]), Row::new(["13", "B"]), Row::new(["20", "C"])];
        let right = vec![Row::new(["11", "25"]), Row::new(["13", "26"]), Row::new(["20", "30"])];
        nested_loop_join(&left, &right)
    }

    fn field(relation: &str, column: &str, side: Side, position: usize) -> ResolvedField {
        ResolvedField {
            relation: relation.to_string(),
            column: column.to_string(),
            side,
            position,
        }
    }

    #[test]
    fn test_project_all() {
        let output = project(&seed_join(), &ProjectionSpec::All).unwrap();
        assert_eq!(output.lines(), ["11 | A | 11 | 25", "13 | B | 13 | 26", "20 | C | 20 | 30"]);
    }

    #[test]
    fn test_project_single_right_field() {
        let spec = ProjectionSpec::SingleField(field("t2", "age", Side::Right, 1));
        let output = project(&seed_join(), &spec).unwrap();
        assert_eq!(output.render("NO_ROWS"), "25\n26\n30");
    }

    #[test]
    fn test_project_field_list() {
        let spec = ProjectionSpec::Fields(vec![
            field("t1", "name", Side::Left, 1),
            field("t2", "age", Side::Right, 1),
        ]);
        let output = project(&seed_join(), &spec).unwrap();
        assert_eq!(output.lines(), ["A | 25", "B | 26", "C | 30"]);
    }

    #[test]
    fn test_short_row_renders_empty_value() {
        let joined = nested_loop_join(&[Row::new(["1"])], &[Row::new(["1", "9"])]);
        let spec = ProjectionSpec::SingleField(field("t1", "name", Side::Left, 1));
        assert_eq!(project(&joined, &spec).unwrap().lines(), [""]);
    }

    #[test]
    fn test_empty_join_renders_indicator() {
        let output = project(&[], &ProjectionSpec::All).unwrap();
        assert_eq!(output, FormattedOutput::NoRows);
        assert_eq!(output.render("NO_ROWS"), "NO_ROWS");
    }

    #[test]
    fn test_invalid_field_beats_empty_result() {
        let spec = ProjectionSpec::Invalid {
            field: "t1.age".to_string(),
            reason: "relation 't1' has no column 'age'".to_string(),
            suggestion: None,
        };
        assert!(matches!(project(&[], &spec), Err(JoinError::FieldReference { .. })));
        assert!(matches!(project(&seed_join(), &spec), Err(JoinError::FieldReference { .. })));
    }
}
