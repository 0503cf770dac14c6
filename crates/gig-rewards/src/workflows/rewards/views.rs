use serde::Serialize;

use super::batch::RecomputeSummary;
use super::domain::{BenefitId, MetricSnapshot, Rule, RuleId, WorkerId, WorkerProfile};
use super::engine::IssuanceReport;
use super::evaluation::ConditionGap;
use super::ingestion::IngestionOutcome;

/// Benefit ready to be claimed, as shown on the worker's benefits page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnlockedBenefitView {
    pub id: BenefitId,
    pub title: String,
    pub partner: String,
    pub validity: String,
    pub granted_at: String,
}

/// Active rule the worker has not met yet, with what is still missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailableSoonView {
    pub rule_id: RuleId,
    pub title: String,
    pub missing: Vec<ConditionGap>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenefitsSummary {
    pub unlocked: Vec<UnlockedBenefitView>,
    pub available_soon: Vec<AvailableSoonView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerSummary {
    pub worker_id: WorkerId,
    pub name: String,
    pub points: u32,
    pub level: u32,
    pub kpis: MetricSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_benefit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_unlock: Option<AvailableSoonView>,
}

/// Worker that would match a rule under preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewHit {
    pub id: WorkerId,
    pub name: String,
    pub completed_orders_30d: u32,
    pub on_time_rate: f64,
}

impl From<&WorkerProfile> for PreviewHit {
    fn from(worker: &WorkerProfile) -> Self {
        Self {
            id: worker.id.clone(),
            name: worker.name.clone(),
            completed_orders_30d: worker.metrics.completed_orders_30d,
            on_time_rate: worker.metrics.on_time_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePreview {
    pub rule_id: RuleId,
    pub count: usize,
    pub workers: Vec<PreviewHit>,
}

/// Admin listing row with conditions rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleView {
    #[serde(flatten)]
    pub rule: Rule,
    pub condition_summary: String,
    pub reward_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuanceView {
    pub worker_id: WorkerId,
    pub issued: Vec<BenefitId>,
    pub failures: Vec<String>,
}

impl From<&IssuanceReport> for IssuanceView {
    fn from(report: &IssuanceReport) -> Self {
        Self {
            worker_id: report.worker_id.clone(),
            issued: report.issued.clone(),
            failures: report.failures.iter().map(|failure| failure.summary()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeView {
    pub workers_evaluated: usize,
    pub benefits_issued: usize,
    pub rule_failures: usize,
    pub failed_workers: Vec<WorkerId>,
}

impl From<&RecomputeSummary> for RecomputeView {
    fn from(summary: &RecomputeSummary) -> Self {
        Self {
            workers_evaluated: summary.workers_evaluated,
            benefits_issued: summary.benefits_issued,
            rule_failures: summary.rule_failures,
            failed_workers: summary
                .failed_workers
                .iter()
                .map(|failure| failure.worker_id.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionView {
    pub accepted: usize,
    pub points_awarded: u32,
    pub snapshot: MetricSnapshot,
    pub issuance: IssuanceView,
}

impl From<&IngestionOutcome> for IngestionView {
    fn from(outcome: &IngestionOutcome) -> Self {
        Self {
            accepted: outcome.accepted,
            points_awarded: outcome.points_awarded,
            snapshot: outcome.snapshot,
            issuance: IssuanceView::from(&outcome.issuance),
        }
    }
}

