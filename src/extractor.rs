//! Query Pattern Extractor
//!
//! Recognizes the one statement shape the simulator handles:
//!
//! ```text
//! SELECT <fields|*> FROM <rel1> INNER JOIN <rel2> ON <condition> [;]
//! ```
//!
//! Keywords are case-insensitive and whitespace is free-form. Anything else is
//! reported as "not a join query" so the caller can route it elsewhere. The
//! projection is resolved against the configured schema exactly once, here,
//! so later stages never re-inspect the select list text.

use crate::config::JoinSchema;
use crate::error::{JoinError, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;
use tracing::debug;

const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Which input of the join a field comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// A select-list entry bound to a side and a column position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub relation: String,
    pub column: String,
    pub side: Side,
    pub position: usize,
}

impl ResolvedField {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.relation, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionSpec {
    /// `*`: every field of both sides
    All,
    SingleField(ResolvedField),
    /// Two or more fields, rendered in select-list order
    Fields(Vec<ResolvedField>),
    /// A reference that does not exist on its declared relation
    Invalid {
        field: String,
        reason: String,
        suggestion: Option<String>,
    },
}

impl ProjectionSpec {
    /// Fails with `FieldReference` for an `Invalid` projection
    pub fn validate(&self) -> Result<()> {
        match self {
            ProjectionSpec::Invalid { field, reason, suggestion } => Err(JoinError::FieldReference {
                field: field.clone(),
                reason: reason.clone(),
                suggestion: suggestion.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            ProjectionSpec::All => "*".to_string(),
            ProjectionSpec::SingleField(f) => f.qualified_name(),
            ProjectionSpec::Fields(fields) => fields.iter().map(|f| f.qualified_name()).join(", "),
            ProjectionSpec::Invalid { field, .. } => format!("invalid({})", field),
        }
    }
}

/// Column reference as written in the ON clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub relation: Option<String>,
    pub column: String,
}

/// Decoded `a.x = b.y` condition. Informational only: the join always
/// compares field 0 of each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCondition {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub projection: ProjectionSpec,
    /// Select list as written
    pub fields_text: String,
    pub left_relation: String,
    pub right_relation: String,
    /// ON clause as written, without the trailing `;`
    pub condition_text: String,
    pub key_condition: Option<KeyCondition>,
}

impl JoinSpec {
    /// Equivalent comma-join statement for engines without INNER JOIN support.
    /// The ON condition is dropped; the caller filters the cross product.
    pub fn cross_product_sql(&self) -> String {
        format!(
            "SELECT {} FROM {}, {};",
            self.fields_text, self.left_relation, self.right_relation
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Word(String),
    Dot,
    Comma,
    Star,
    Eq,
    Semicolon,
    Symbol(char),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

impl Token {
    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }
}

fn tokenize(sql: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            let mut end = start + c.len_utf8();
            while let Some(&(i, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    end = i + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                kind: TokenKind::Word(sql[start..end].to_string()),
                start,
                end,
            });
            continue;
        }
        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '*' => TokenKind::Star,
            '=' => TokenKind::Eq,
            ';' => TokenKind::Semicolon,
            other => TokenKind::Symbol(other),
        };
        tokens.push(Token {
            kind,
            start,
            end: start + c.len_utf8(),
        });
    }

    tokens
}

fn span_text<'a>(sql: &'a str, tokens: &[Token]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &sql[first.start..last.end],
        _ => "",
    }
}

/// Parses `word` or `word.word`
fn parse_column_ref(tokens: &[Token]) -> Option<ColumnRef> {
    match tokens {
        [col] => Some(ColumnRef {
            relation: None,
            column: col.word()?.to_string(),
        }),
        [rel, dot, col] if dot.kind == TokenKind::Dot => Some(ColumnRef {
            relation: Some(rel.word()?.to_string()),
            column: col.word()?.to_string(),
        }),
        _ => None,
    }
}

fn parse_key_condition(tokens: &[Token]) -> Option<KeyCondition> {
    let eq = tokens.iter().position(|t| t.kind == TokenKind::Eq)?;
    Some(KeyCondition {
        left: parse_column_ref(&tokens[..eq])?,
        right: parse_column_ref(&tokens[eq + 1..])?,
    })
}

pub struct QueryExtractor {
    schema: JoinSchema,
}

impl QueryExtractor {
    pub fn new(schema: JoinSchema) -> Self {
        Self { schema }
    }

    /// Decompose a join statement. Returns `None` when the input is not the
    /// supported shape; that is a routing signal, not an error.
    pub fn extract(&self, sql: &str) -> Option<JoinSpec> {
        let mut tokens = tokenize(sql);
        if tokens.last().map(|t| t.kind == TokenKind::Semicolon).unwrap_or(false) {
            tokens.pop();
        }
        if tokens.iter().any(|t| t.kind == TokenKind::Semicolon) {
            debug!("Rejecting multi-statement input");
            return None;
        }

        if !tokens.first()?.is_keyword("SELECT") {
            return None;
        }

        // First FROM that is followed by `<rel> INNER JOIN <rel> ON <cond>`
        let (from_idx, left, right) = (2..tokens.len()).find_map(|i| {
            let tail = &tokens[i..];
            if tail.len() < 7 || !tail[0].is_keyword("FROM") {
                return None;
            }
            let left = tail[1].word()?;
            let right = tail[4].word()?;
            let shape_ok = tail[2].is_keyword("INNER") && tail[3].is_keyword("JOIN") && tail[5].is_keyword("ON");
            shape_ok.then(|| (i, left.to_string(), right.to_string()))
        })?;

        let field_tokens = &tokens[1..from_idx];
        let condition_tokens = &tokens[from_idx + 6..];
        // Only two relations: a further JOIN/ON means a chained join
        if condition_tokens.iter().any(|t| t.is_keyword("JOIN") || t.is_keyword("ON")) {
            debug!("Rejecting join over more than two relations");
            return None;
        }

        let projection = self.resolve_projection(field_tokens, &left, &right);
        let spec = JoinSpec {
            projection,
            fields_text: span_text(sql, field_tokens).to_string(),
            condition_text: span_text(sql, condition_tokens).to_string(),
            key_condition: parse_key_condition(condition_tokens),
            left_relation: left,
            right_relation: right,
        };

        debug!(
            "Extracted join: {} INNER JOIN {} ON {} -> {}",
            spec.left_relation,
            spec.right_relation,
            spec.condition_text,
            spec.projection.label()
        );
        Some(spec)
    }

    fn resolve_projection(&self, tokens: &[Token], left: &str, right: &str) -> ProjectionSpec {
        if let [only] = tokens {
            if only.kind == TokenKind::Star {
                return ProjectionSpec::All;
            }
        }

        let mut fields = Vec::new();
        for item in tokens.split(|t| t.kind == TokenKind::Comma) {
            let written = item.iter().map(|t| token_text(t)).join("");
            let Some(column_ref) = parse_column_ref(item) else {
                return ProjectionSpec::Invalid {
                    field: written,
                    reason: "unsupported select expression".to_string(),
                    suggestion: None,
                };
            };
            match self.resolve_field(&column_ref, left, right) {
                Ok(field) => fields.push(field),
                Err(reason) => {
                    return ProjectionSpec::Invalid {
                        suggestion: self.suggest(&written, left, right),
                        field: written,
                        reason,
                    }
                }
            }
        }

        match fields.len() {
            1 => ProjectionSpec::SingleField(fields.remove(0)),
            _ => ProjectionSpec::Fields(fields),
        }
    }

    fn resolve_field(
        &self,
        column_ref: &ColumnRef,
        left: &str,
        right: &str,
    ) -> std::result::Result<ResolvedField, String> {
        let bind = |side: Side, relation: &str| -> Option<ResolvedField> {
            let columns = match side {
                Side::Left => &self.schema.left_columns,
                Side::Right => &self.schema.right_columns,
            };
            let position = columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&column_ref.column))?;
            Some(ResolvedField {
                relation: relation.to_string(),
                column: columns[position].clone(),
                side,
                position,
            })
        };

        match &column_ref.relation {
            Some(qualifier) => {
                let (side, relation) = if qualifier.eq_ignore_ascii_case(left) {
                    (Side::Left, left)
                } else if qualifier.eq_ignore_ascii_case(right) {
                    (Side::Right, right)
                } else {
                    return Err(format!("relation '{}' is not part of this join", qualifier));
                };
                bind(side, relation)
                    .ok_or_else(|| format!("relation '{}' has no column '{}'", relation, column_ref.column))
            }
            None => match (bind(Side::Left, left), bind(Side::Right, right)) {
                (Some(field), None) | (None, Some(field)) => Ok(field),
                (Some(_), Some(_)) => Err(format!(
                    "column '{}' is ambiguous between '{}' and '{}'",
                    column_ref.column, left, right
                )),
                (None, None) => Err(format!("no relation in this join has column '{}'", column_ref.column)),
            },
        }
    }

    fn suggest(&self, written: &str, left: &str, right: &str) -> Option<String> {
        let written = written.to_lowercase();
        let left_names = self.schema.left_columns.iter().map(|c| format!("{}.{}", left, c));
        let right_names = self.schema.right_columns.iter().map(|c| format!("{}.{}", right, c));

        left_names
            .chain(right_names)
            .map(|candidate| (jaro_winkler(&written, &candidate.to_lowercase()), candidate))
            .filter(|(score, candidate)| *score >= SUGGESTION_THRESHOLD && candidate.to_lowercase() != written)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate)
    }
}

fn token_text(token: &Token) -> String {
    match &token.kind {
        TokenKind::Word(w) => w.clone(),
        TokenKind::Dot => ".".to_string(),
        TokenKind::Comma => ",".to_string(),
        TokenKind::Star => "*".to_string(),
        TokenKind::Eq => "=".to_string(),
        TokenKind::Semicolon => ";".to_string(),
        TokenKind::Symbol(c) => c.to_string(),
    }
}
