//! Gig-worker rewards: metric snapshots, eligibility rules, and the engine that turns a
//! matching rule into an issued benefit with an audit trail.
//!
//! Storage is reached only through the traits in [`repository`], so the engine, batch driver,
//! and ingestion path run unchanged against in-memory fakes or a real database adapter.

pub mod batch;
pub mod domain;
pub mod engine;
pub mod evaluation;
pub mod import;
pub mod ingestion;
mod metrics;
pub mod repository;
pub mod reward;
pub mod router;
pub mod service;
pub mod views;

#[cfg(test)]
mod tests;

pub use batch::{RecomputeDriver, RecomputeError, RecomputeSummary, WorkerFailure};
pub use domain::{
    audit_timestamp, ActivityKind, ActivityRecord, AuditAction, AuditActor, AuditEntry, Benefit,
    BenefitId, BenefitState, ComparisonOperator, Condition, GroupLogic, MetricKey,
    MetricSnapshot, NewBenefit, NewRule, RewardKind, RewardSpec, Rule, RuleId, WorkerId,
    WorkerProfile, WorkerRole,
};
pub use engine::{IssuanceEngine, IssuanceError, IssuanceReport, IssuanceStage, RuleFailure};
pub use evaluation::{combine, condition_gaps, evaluate, ConditionGap};
pub use import::{ActivityCsvImporter, ActivityImportError};
pub use ingestion::{ActivityIngestor, IngestionError, IngestionOutcome};
pub use metrics::snapshot_from_activities;
pub use repository::{
    AuditLog, BenefitRepository, RepositoryError, RewardsStore, RuleRepository, WorkerRepository,
};
pub use reward::{format_reward, RewardDisplay};
pub use router::rewards_router;
pub use service::{
    ActivityQuery, AuditQuery, RewardsService, RewardsServiceError, RuleStatusChange,
};
