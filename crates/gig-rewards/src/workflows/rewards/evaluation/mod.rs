//! Pure predicate evaluation over a worker's metric snapshot.
//!
//! Both entry points are total: unknown metrics read as zero, unrecognized operators never
//! hold, and a rule without conditions never matches.

mod gaps;

pub use gaps::{condition_gaps, ConditionGap};

use super::domain::{ComparisonOperator, Condition, GroupLogic, MetricSnapshot, Rule};

/// Evaluate one condition against a snapshot.
///
/// `=` is exact floating-point equality, so it is only dependable on integer-valued metrics.
pub fn evaluate(condition: &Condition, snapshot: &MetricSnapshot) -> bool {
    let value = snapshot.value(&condition.metric);
    let threshold = condition.threshold;

    match &condition.operator {
        ComparisonOperator::AtLeast => value >= threshold,
        ComparisonOperator::AtMost => value <= threshold,
        ComparisonOperator::Equal => value == threshold,
        ComparisonOperator::Unrecognized(_) => false,
    }
}

/// Combine a rule's conditions with its group logic.
pub fn combine(rule: &Rule, snapshot: &MetricSnapshot) -> bool {
    // An empty AND would otherwise be vacuously true.
    if rule.conditions.is_empty() {
        return false;
    }

    let mut results = rule
        .conditions
        .iter()
        .map(|condition| evaluate(condition, snapshot));

    match rule.group_logic {
        GroupLogic::And => results.all(|held| held),
        GroupLogic::Or => results.any(|held| held),
    }
}
