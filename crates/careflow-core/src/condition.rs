//! # Condition Evaluator
//!
//! Decides whether a single condition holds for a snapshot.
//!
//! - Unknown or absent attributes make a condition `false`; evaluation never fails
//! - Numeric-looking text on either side is compared as an integer
//! - No operator means equality, and the value kinds must agree after coercion
//! - A `sub_condition` must hold as well; nesting depth is unbounded
//!
//! Evaluation is pure. Each evaluated condition emits one `trace` event, in
//! evaluation order.

use crate::attribute::{AttributeRef, Snapshot, Value};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// OPERATOR
// =============================================================================

/// Ordering comparison. Equality is expressed by the absence of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `>=`
    Ge,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `<`
    Lt,
}

impl Operator {
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Lt => "<",
        }
    }

    /// Whether `actual <op> expected` holds, given `actual.cmp(expected)`.
    #[must_use]
    pub fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Ge => ordering != Ordering::Less,
            Self::Gt => ordering == Ordering::Greater,
            Self::Le => ordering != Ordering::Greater,
            Self::Lt => ordering == Ordering::Less,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">=" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            "<" => Ok(Self::Lt),
            other => Err(format!(
                "unsupported operator '{}' (expected >=, >, <= or <)",
                other
            )),
        }
    }
}

// =============================================================================
// CONDITION
// =============================================================================

/// One gating test against one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: AttributeRef,
    pub operator: Option<Operator>,
    pub value: Value,
    /// Must hold in addition to this condition.
    pub sub_condition: Option<Box<Condition>>,
}

impl Condition {
    /// `attribute == value`
    #[must_use]
    pub fn equals(attribute: impl Into<AttributeRef>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            operator: None,
            value: value.into(),
            sub_condition: None,
        }
    }

    /// `attribute <operator> value`
    #[must_use]
    pub fn compare(
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator: Some(operator),
            value: value.into(),
            sub_condition: None,
        }
    }

    /// Attach a nested condition that must also hold.
    #[must_use]
    pub fn with_sub_condition(mut self, sub: Condition) -> Self {
        self.sub_condition = Some(Box::new(sub));
        self
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Some(op) => write!(f, "{} {} {}", self.attribute, op, self.value)?,
            None => write!(f, "{} == {}", self.attribute, self.value)?,
        }
        if let Some(sub) = &self.sub_condition {
            write!(f, " and ({})", sub)?;
        }
        Ok(())
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Evaluate `condition`, including its sub-conditions, against `snapshot`.
pub fn evaluate<S: Snapshot + ?Sized>(snapshot: &S, condition: &Condition) -> bool {
    let passed = compare(snapshot, condition);

    tracing::trace!(
        attribute = %condition.attribute,
        operator = condition.operator.map_or("==", |op| op.symbol()),
        expected = %condition.value,
        passed,
        "condition evaluated"
    );

    passed
        && condition
            .sub_condition
            .as_deref()
            .is_none_or(|sub| evaluate(snapshot, sub))
}

fn compare<S: Snapshot + ?Sized>(snapshot: &S, condition: &Condition) -> bool {
    let AttributeRef::Known(key) = &condition.attribute else {
        return false;
    };
    let Some(actual) = snapshot.attribute(*key) else {
        return false;
    };

    let actual = actual.coerced();
    let expected = condition.value.coerced();

    match condition.operator {
        None => actual == expected,
        Some(op) => ordering(&actual, &expected).is_some_and(|o| op.holds(o)),
    }
}

/// Ordering between two coerced values of the same kind.
fn ordering(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
