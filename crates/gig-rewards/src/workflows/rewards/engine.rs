use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::domain::{
    AuditAction, AuditActor, AuditEntry, BenefitId, BenefitState, NewBenefit, Rule, RuleId,
    WorkerId, WorkerProfile,
};
use super::evaluation::combine;
use super::repository::{AuditLog, RepositoryError, RewardsStore};
use super::reward::format_reward;

/// Issues benefits for a worker whose metrics satisfy active rules.
///
/// Evaluations of the same worker are serialized through a per-worker lock so the
/// check-then-create sequence cannot hand out two open grants for one rule.
pub struct IssuanceEngine<S, L> {
    store: Arc<S>,
    audit: Arc<L>,
    locks: WorkerLocks,
}

impl<S, L> IssuanceEngine<S, L>
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<L>) -> Self {
        Self {
            store,
            audit,
            locks: WorkerLocks::default(),
        }
    }

    /// Run every active rule against the worker's snapshot.
    ///
    /// An unknown worker yields an empty report. Load failures abort the evaluation; failures
    /// while issuing a single rule are recorded in the report and the remaining rules still run.
    pub fn evaluate_worker(&self, worker_id: &WorkerId) -> Result<IssuanceReport, IssuanceError> {
        self.serialized(worker_id, || self.evaluate_locked(worker_id))
    }

    /// Run `work` while holding the worker's lock. Not reentrant: `work` must not call
    /// [`IssuanceEngine::evaluate_worker`] for the same worker.
    pub(crate) fn serialized<T>(&self, worker_id: &WorkerId, work: impl FnOnce() -> T) -> T {
        let lock = self.locks.acquire(worker_id);
        let outcome = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            work()
        };
        self.locks.release(worker_id, lock);
        outcome
    }

    #[cfg(test)]
    pub(crate) fn tracked_workers(&self) -> usize {
        self.locks.len()
    }

    fn evaluate_locked(&self, worker_id: &WorkerId) -> Result<IssuanceReport, IssuanceError> {
        let mut report = IssuanceReport::empty(worker_id.clone());

        let Some(worker) = self.store.worker(worker_id)? else {
            debug!(worker = %worker_id, "skipping evaluation for unknown worker");
            return Ok(report);
        };

        let rules = self.store.active_rules()?;

        for rule in &rules {
            if !combine(rule, &worker.metrics) {
                continue;
            }

            match self.issue(&worker, rule) {
                Ok(Some(benefit_id)) => report.issued.push(benefit_id),
                Ok(None) => {}
                Err(failure) => {
                    warn!(
                        worker = %worker_id,
                        rule = %rule.id,
                        stage = ?failure.stage,
                        error = %failure.error,
                        "benefit issuance failed"
                    );
                    if let Some(benefit_id) = &failure.benefit_id {
                        report.issued.push(benefit_id.clone());
                    }
                    report.failures.push(failure);
                }
            }
        }

        if !report.issued.is_empty() {
            info!(
                worker = %worker_id,
                issued = report.issued.len(),
                "issued benefits"
            );
        }

        Ok(report)
    }

    fn issue(&self, worker: &WorkerProfile, rule: &Rule) -> Result<Option<BenefitId>, RuleFailure> {
        let existing = self
            .store
            .find_benefit(&worker.id, &rule.id, &BenefitState::OPEN)
            .map_err(|error| RuleFailure::new(rule, IssuanceStage::Lookup, error))?;
        if existing.is_some() {
            debug!(worker = %worker.id, rule = %rule.id, "open benefit already issued");
            return Ok(None);
        }

        let display = format_reward(rule.reward.as_ref(), &rule.name);
        let now = Utc::now();
        let created = self.store.create_benefit(NewBenefit {
            worker_id: worker.id.clone(),
            source_rule_id: rule.id.clone(),
            title: display.title.clone(),
            partner: display.partner,
            validity: display.validity,
            created_at: now,
        });

        let benefit = match created {
            Ok(benefit) => benefit,
            Err(RepositoryError::Conflict) => {
                debug!(worker = %worker.id, rule = %rule.id, "store rejected duplicate benefit");
                return Ok(None);
            }
            Err(error) => return Err(RuleFailure::new(rule, IssuanceStage::Create, error)),
        };

        let entry = AuditEntry::new(AuditActor::Engine, AuditAction::BenefitIssued, now)
            .worker(worker.name.clone())
            .rule(rule.name.clone())
            .benefit(display.title)
            .details("Auto-issued on evaluation");

        if let Err(error) = self.audit.append(entry) {
            let mut failure = RuleFailure::new(rule, IssuanceStage::Audit, error);
            failure.benefit_id = Some(benefit.id);
            return Err(failure);
        }

        Ok(Some(benefit.id))
    }
}

/// Outcome of evaluating a single worker.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceReport {
    pub worker_id: WorkerId,
    /// Newly created benefits in rule evaluation order.
    pub issued: Vec<BenefitId>,
    pub failures: Vec<RuleFailure>,
}

impl IssuanceReport {
    fn empty(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            issued: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Step of issuance that failed for one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceStage {
    Lookup,
    Create,
    Audit,
}

/// Persistence failure scoped to a single rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub stage: IssuanceStage,
    pub error: RepositoryError,
    /// Present when the benefit was stored but its audit entry was not.
    pub benefit_id: Option<BenefitId>,
}

impl RuleFailure {
    fn new(rule: &Rule, stage: IssuanceStage, error: RepositoryError) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            stage,
            error,
            benefit_id: None,
        }
    }

    pub fn summary(&self) -> String {
        let stage = match self.stage {
            IssuanceStage::Lookup => "checking existing benefits",
            IssuanceStage::Create => "creating benefit",
            IssuanceStage::Audit => "recording audit entry",
        };
        format!("rule '{}' failed while {}: {}", self.rule_name, stage, self.error)
    }
}

/// Failure loading the inputs of an evaluation.
#[derive(Debug, thiserror::Error)]
pub enum IssuanceError {
    #[error("failed to load evaluation inputs: {0}")]
    Repository(#[from] RepositoryError),
}

/// One mutex per worker currently being evaluated. Entries are dropped once the last holder
/// releases them.
#[derive(Default)]
struct WorkerLocks {
    inner: Mutex<HashMap<WorkerId, Arc<Mutex<()>>>>,
}

impl WorkerLocks {
    fn acquire(&self, worker_id: &WorkerId) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(worker_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release(&self, worker_id: &WorkerId, lock: Arc<Mutex<()>>) {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and `lock` are the only handles left.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(worker_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
