use chrono::{DateTime, Utc};

use super::domain::{
    ActivityRecord, AuditEntry, Benefit, BenefitId, BenefitState, MetricSnapshot, NewBenefit,
    NewRule, Rule, RuleId, WorkerId, WorkerProfile,
};

/// Worker accounts, their snapshots, and their uploaded activity.
pub trait WorkerRepository: Send + Sync {
    fn worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError>;
    fn workers(&self) -> Result<Vec<WorkerProfile>, RepositoryError>;
    fn update_worker(&self, worker: WorkerProfile) -> Result<(), RepositoryError>;
    fn append_activities(
        &self,
        id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<(), RepositoryError>;
    /// All activity for the worker in upload order.
    fn activities(&self, id: &WorkerId) -> Result<Vec<ActivityRecord>, RepositoryError>;

    fn snapshot(&self, id: &WorkerId) -> Result<Option<MetricSnapshot>, RepositoryError> {
        Ok(self.worker(id)?.map(|worker| worker.metrics))
    }
}

/// Rule storage. Implementations must keep `rules` ordered by id.
pub trait RuleRepository: Send + Sync {
    fn rules(&self) -> Result<Vec<Rule>, RepositoryError>;
    fn rule(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError>;
    fn insert_rule(&self, rule: NewRule, updated_at: DateTime<Utc>)
        -> Result<Rule, RepositoryError>;
    fn update_rule(&self, rule: Rule) -> Result<(), RepositoryError>;

    fn active_rules(&self) -> Result<Vec<Rule>, RepositoryError> {
        let mut rules: Vec<Rule> = self.rules()?.into_iter().filter(|rule| rule.active).collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }
}

/// Benefit storage.
///
/// `create_benefit` should refuse with [`RepositoryError::Conflict`] when an open benefit
/// already exists for the same worker and rule, so the single-open-grant invariant holds even
/// if callers race.
pub trait BenefitRepository: Send + Sync {
    fn find_benefit(
        &self,
        worker: &WorkerId,
        rule: &RuleId,
        states: &[BenefitState],
    ) -> Result<Option<Benefit>, RepositoryError>;
    fn create_benefit(&self, benefit: NewBenefit) -> Result<Benefit, RepositoryError>;
    fn benefit(&self, id: &BenefitId) -> Result<Option<Benefit>, RepositoryError>;
    fn update_benefit(&self, benefit: Benefit) -> Result<(), RepositoryError>;
    fn benefits_for(&self, worker: &WorkerId) -> Result<Vec<Benefit>, RepositoryError>;
}

/// Everything the engine reads and writes apart from the audit trail.
pub trait RewardsStore: WorkerRepository + RuleRepository + BenefitRepository {}

impl<T> RewardsStore for T where T: WorkerRepository + RuleRepository + BenefitRepository {}

/// Append-only audit trail.
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError>;
    /// Entries in append order.
    fn entries(&self) -> Result<Vec<AuditEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
