use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{AuditAction, AuditActor, AuditEntry, WorkerId, WorkerRole};
use super::engine::{IssuanceEngine, IssuanceError};
use super::repository::{AuditLog, RepositoryError, RewardsStore};

/// Fans the issuance engine out over every worker account.
pub struct RecomputeDriver<S, L> {
    engine: Arc<IssuanceEngine<S, L>>,
    store: Arc<S>,
    audit: Arc<L>,
}

impl<S, L> RecomputeDriver<S, L>
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    pub fn new(engine: Arc<IssuanceEngine<S, L>>, store: Arc<S>, audit: Arc<L>) -> Self {
        Self {
            engine,
            store,
            audit,
        }
    }

    /// Evaluate every account with the worker role, then append one `recompute` entry.
    ///
    /// Workers are evaluated sequentially. A failing worker is recorded in the summary and the
    /// batch moves on.
    pub fn recompute_all(&self) -> Result<RecomputeSummary, RecomputeError> {
        let workers = self
            .store
            .workers()
            .map_err(RecomputeError::ListWorkers)?;

        let mut summary = RecomputeSummary::default();

        for worker in workers
            .into_iter()
            .filter(|worker| worker.role == WorkerRole::Worker)
        {
            summary.workers_evaluated += 1;
            match self.engine.evaluate_worker(&worker.id) {
                Ok(report) => {
                    summary.benefits_issued += report.issued.len();
                    summary.rule_failures += report.failures.len();
                }
                Err(error) => {
                    warn!(worker = %worker.id, %error, "worker evaluation failed during recompute");
                    summary.failed_workers.push(WorkerFailure {
                        worker_id: worker.id,
                        error,
                    });
                }
            }
        }

        let entry = AuditEntry::new(AuditActor::Engine, AuditAction::Recompute, Utc::now())
            .details(format!(
                "Recomputed {} workers, issued {} benefits",
                summary.workers_evaluated, summary.benefits_issued
            ));
        self.audit
            .append(entry)
            .map_err(RecomputeError::Audit)?;

        info!(
            workers = summary.workers_evaluated,
            issued = summary.benefits_issued,
            failed = summary.failed_workers.len(),
            "recompute finished"
        );

        Ok(summary)
    }
}

/// Aggregate outcome of a batch recompute.
#[derive(Debug, Default)]
pub struct RecomputeSummary {
    pub workers_evaluated: usize,
    pub benefits_issued: usize,
    pub rule_failures: usize,
    pub failed_workers: Vec<WorkerFailure>,
}

impl RecomputeSummary {
    pub fn is_clean(&self) -> bool {
        self.rule_failures == 0 && self.failed_workers.is_empty()
    }
}

#[derive(Debug)]
pub struct WorkerFailure {
    pub worker_id: WorkerId,
    pub error: IssuanceError,
}

/// Error raised when the batch itself cannot run or cannot be recorded.
#[derive(Debug, thiserror::Error)]
pub enum RecomputeError {
    #[error("failed to list workers: {0}")]
    ListWorkers(RepositoryError),
    #[error("failed to record recompute summary: {0}")]
    Audit(RepositoryError),
}
