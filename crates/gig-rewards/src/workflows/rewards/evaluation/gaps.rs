use serde::Serialize;

use super::super::domain::{ComparisonOperator, Condition, MetricSnapshot};

/// Distance between a worker's current metric and a condition that does not yet hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGap {
    pub metric: String,
    pub operator: String,
    pub need: f64,
    pub current: f64,
    pub gap: f64,
}

/// Gaps for every condition still short of its threshold.
///
/// `=` reports a unit gap when unequal since there is no meaningful direction to close it.
pub fn condition_gaps(conditions: &[Condition], snapshot: &MetricSnapshot) -> Vec<ConditionGap> {
    conditions
        .iter()
        .map(|condition| {
            let current = snapshot.value(&condition.metric);
            let need = condition.threshold;
            let gap = match &condition.operator {
                ComparisonOperator::AtLeast => (need - current).max(0.0),
                ComparisonOperator::AtMost => (current - need).max(0.0),
                ComparisonOperator::Equal => {
                    if current == need {
                        0.0
                    } else {
                        1.0
                    }
                }
                ComparisonOperator::Unrecognized(_) => 0.0,
            };

            ConditionGap {
                metric: condition.metric.as_str().to_string(),
                operator: condition.operator.symbol().to_string(),
                need,
                current,
                gap,
            }
        })
        .filter(|gap| gap.gap > 0.0)
        .collect()
}
