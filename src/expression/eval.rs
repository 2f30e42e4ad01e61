//! Expression evaluation against report records
//!
//! Evaluation is read-only over the report and the AST, so compiled
//! expressions can be shared across concurrent evaluations.

use crate::domain::ReportRecord;
use crate::expression::{CompareOp, Expression, Literal, PathExpr, PathFunc};
use serde_json::Value;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    /// A text scalar
    Text(String),
    /// A numeric scalar
    Number(f64),
    /// A boolean
    Bool(bool),
    /// A structured sub-resource (object or array)
    Resource(Value),
    /// Missing, null, or blank
    Empty,
}

impl ExprValue {
    /// Coerces the value to a condition verdict
    ///
    /// `Bool` is taken as-is; anything else is true only when non-empty.
    /// A bare path used as a condition therefore reads as existence.
    pub fn truthy(&self) -> bool {
        match self {
            ExprValue::Bool(b) => *b,
            ExprValue::Empty => false,
            ExprValue::Text(s) => !s.trim().is_empty(),
            ExprValue::Number(_) | ExprValue::Resource(_) => true,
        }
    }

    /// Renders the value as a string for output assignment
    ///
    /// Resources and Empty render to `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            ExprValue::Text(s) => Some(s.clone()),
            ExprValue::Number(n) => Some(format_number(*n)),
            ExprValue::Bool(b) => Some(b.to_string()),
            ExprValue::Resource(_) | ExprValue::Empty => None,
        }
    }
}

/// Whole numbers print without a trailing `.0`
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl Expression {
    /// Evaluates the expression against a report
    ///
    /// `scope` narrows path resolution to a sub-resource (the element's
    /// `resource` expression result); paths fall back to the report body
    /// when no scope is given.
    pub fn evaluate(&self, report: &ReportRecord, scope: Option<&Value>) -> ExprValue {
        match self {
            Expression::Literal(lit) => match lit {
                Literal::Text(s) => ExprValue::Text(s.clone()),
                Literal::Number(n) => ExprValue::Number(*n),
                Literal::Bool(b) => ExprValue::Bool(*b),
            },
            Expression::Path(path) => evaluate_path(path, report, scope),
            Expression::Compare { op, lhs, rhs } => {
                let lhs = lhs.evaluate(report, scope);
                let rhs = rhs.evaluate(report, scope);
                let equal = values_equal(&lhs, &rhs);
                ExprValue::Bool(match op {
                    CompareOp::Eq => equal,
                    CompareOp::NotEq => !equal,
                })
            }
            Expression::And(lhs, rhs) => ExprValue::Bool(
                lhs.evaluate(report, scope).truthy() && rhs.evaluate(report, scope).truthy(),
            ),
            Expression::Or(lhs, rhs) => ExprValue::Bool(
                lhs.evaluate(report, scope).truthy() || rhs.evaluate(report, scope).truthy(),
            ),
            Expression::Not(inner) => ExprValue::Bool(!inner.evaluate(report, scope).truthy()),
        }
    }
}

fn evaluate_path(path: &PathExpr, report: &ReportRecord, scope: Option<&Value>) -> ExprValue {
    let root = scope.unwrap_or(&report.body);
    let mut current = Some(root);

    for segment in &path.segments {
        current = current.and_then(|value| {
            let mut next = value.as_object()?.get(&segment.name)?;
            if let Some(i) = segment.index {
                next = next.as_array()?.get(i)?;
            }
            Some(next)
        });
        if current.is_none() {
            break;
        }
    }

    let resolved = match current {
        Some(Value::Null) | None => ExprValue::Empty,
        Some(Value::String(s)) if s.trim().is_empty() => ExprValue::Empty,
        Some(Value::String(s)) => ExprValue::Text(s.clone()),
        Some(Value::Number(n)) => ExprValue::Number(n.as_f64().unwrap_or(0.0)),
        Some(Value::Bool(b)) => ExprValue::Bool(*b),
        Some(other) => ExprValue::Resource(other.clone()),
    };

    match path.func {
        None => resolved,
        Some(PathFunc::Exists) => ExprValue::Bool(!matches!(resolved, ExprValue::Empty)),
        Some(PathFunc::Empty) => ExprValue::Bool(matches!(resolved, ExprValue::Empty)),
    }
}

/// Loose scalar equality: numbers compare numerically, everything else
/// compares by rendered text. Empty equals only Empty.
fn values_equal(lhs: &ExprValue, rhs: &ExprValue) -> bool {
    match (lhs, rhs) {
        (ExprValue::Empty, ExprValue::Empty) => true,
        (ExprValue::Empty, _) | (_, ExprValue::Empty) => false,
        (ExprValue::Number(a), ExprValue::Number(b)) => a == b,
        (ExprValue::Number(a), ExprValue::Text(b)) | (ExprValue::Text(b), ExprValue::Number(a)) => {
            b.trim().parse::<f64>().map(|p| p == *a).unwrap_or(false)
        }
        (a, b) => a.as_text() == b.as_text(),
    }
}
