//! Binary comparison guards such as `{{amount}} > 100`.
//!
//! The condition is interpolated first, then split on the first operator
//! found, trying `==`, `!=`, `>` and `<` in that order. Equality compares
//! trimmed operands as strings. Ordering compares the leading number of each
//! operand as `f64` (`100 USD` reads as 100); an operand that does not start
//! with a number makes the comparison false.

use crate::template::interpolate;
use crate::Payload;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
}

impl Operator {
    const PRIORITY: [(Operator, &'static str); 4] = [
        (Operator::Eq, "=="),
        (Operator::Ne, "!="),
        (Operator::Gt, ">"),
        (Operator::Lt, "<"),
    ];
}

/// What a condition without a recognised operator evaluates to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardFallback {
    /// Treat it as true.
    #[default]
    Allow,
    /// Treat it as false.
    Block,
}

impl GuardFallback {
    fn as_bool(self) -> bool {
        matches!(self, GuardFallback::Allow)
    }
}

/// A parsed, already interpolated comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: String,
    pub operator: Operator,
    pub right: String,
}

impl Comparison {
    /// Split `expression` on the highest-priority operator it contains.
    pub fn parse(expression: &str) -> Option<Self> {
        Operator::PRIORITY.iter().find_map(|(operator, token)| {
            let (left, right) = expression.split_once(token)?;
            Some(Self {
                left: left.trim().to_string(),
                operator: *operator,
                right: right.trim().to_string(),
            })
        })
    }

    pub fn evaluate(&self) -> bool {
        match self.operator {
            Operator::Eq => self.left == self.right,
            Operator::Ne => self.left != self.right,
            Operator::Gt => numeric(&self.left, &self.right).is_some_and(|(l, r)| l > r),
            Operator::Lt => numeric(&self.left, &self.right).is_some_and(|(l, r)| l < r),
        }
    }
}

fn numeric(left: &str, right: &str) -> Option<(f64, f64)> {
    Some((leading_number(left)?, leading_number(right)?))
}

/// Longest numeric prefix of `operand`, after leading whitespace.
fn leading_number(operand: &str) -> Option<f64> {
    let operand = operand.trim_start();
    let end = operand
        .find(|c: char| !matches!(c, '0'..='9' | '+' | '-' | '.' | 'e' | 'E'))
        .unwrap_or(operand.len());
    let candidate = &operand[..end];

    // "1e" or "2-" are not numbers, but their shorter prefixes may be
    (1..=candidate.len())
        .rev()
        .find_map(|len| candidate[..len].parse::<f64>().ok())
}

/// Evaluates guard and condition-node expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEvaluator {
    fallback: GuardFallback,
}

impl ConditionEvaluator {
    pub fn new(fallback: GuardFallback) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> GuardFallback {
        self.fallback
    }

    pub fn evaluate(&self, condition: &str, data: &Payload) -> bool {
        let expression = interpolate(condition, data);
        match Comparison::parse(&expression) {
            Some(comparison) => comparison.evaluate(),
            None => {
                tracing::warn!(
                    condition,
                    fallback = ?self.fallback,
                    "condition has no recognised operator"
                );
                self.fallback.as_bool()
            }
        }
    }
}

/// Evaluate with the default (allowing) fallback.
pub fn evaluate(condition: &str, data: &Payload) -> bool {
    ConditionEvaluator::default().evaluate(condition, data)
}
