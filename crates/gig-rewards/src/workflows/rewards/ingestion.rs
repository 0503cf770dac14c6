use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    ActivityRecord, AuditAction, AuditActor, AuditEntry, MetricSnapshot, WorkerId,
};
use super::engine::{IssuanceEngine, IssuanceError, IssuanceReport};
use super::metrics::snapshot_from_activities;
use super::repository::{AuditLog, RepositoryError, RewardsStore};
use crate::config::RewardsConfig;

/// Stores uploaded activity, rebuilds the worker's snapshot, and re-runs issuance.
pub struct ActivityIngestor<S, L> {
    engine: Arc<IssuanceEngine<S, L>>,
    store: Arc<S>,
    audit: Arc<L>,
    config: RewardsConfig,
}

impl<S, L> ActivityIngestor<S, L>
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    pub fn new(
        engine: Arc<IssuanceEngine<S, L>>,
        store: Arc<S>,
        audit: Arc<L>,
        config: RewardsConfig,
    ) -> Self {
        Self {
            engine,
            store,
            audit,
            config,
        }
    }

    pub fn ingest(
        &self,
        worker_id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<IngestionOutcome, IngestionError> {
        if activities.is_empty() {
            return Err(IngestionError::EmptyPayload);
        }

        let accepted = activities.len();
        let (worker_name, snapshot, points_awarded) = self
            .engine
            .serialized(worker_id, || self.apply_upload(worker_id, activities))?;

        let entry = AuditEntry::new(AuditActor::Engine, AuditAction::Recompute, Utc::now())
            .worker(worker_name)
            .details(format!("Uploaded {accepted} activities and recomputed"));
        self.audit.append(entry)?;

        info!(worker = %worker_id, accepted, points_awarded, "ingested activity");

        let issuance = self.engine.evaluate_worker(worker_id)?;

        Ok(IngestionOutcome {
            accepted,
            snapshot,
            points_awarded,
            issuance,
        })
    }

    /// Append the rows and fold them into the profile. Runs under the worker's lock so
    /// concurrent uploads cannot lose a points credit.
    fn apply_upload(
        &self,
        worker_id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<(String, MetricSnapshot, u32), IngestionError> {
        let mut worker = self
            .store
            .worker(worker_id)?
            .ok_or_else(|| IngestionError::WorkerNotFound(worker_id.clone()))?;

        self.store.append_activities(worker_id, activities)?;

        let history = self.store.activities(worker_id)?;
        let snapshot = snapshot_from_activities(&history, self.config.activity_window);
        let points_awarded = snapshot.completed_orders_30d.min(self.config.points_cap);

        worker.metrics = snapshot;
        worker.points = worker.points.saturating_add(points_awarded);
        let worker_name = worker.name.clone();
        self.store.update_worker(worker)?;

        Ok((worker_name, snapshot, points_awarded))
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionOutcome {
    pub accepted: usize,
    pub snapshot: MetricSnapshot,
    pub points_awarded: u32,
    pub issuance: IssuanceReport,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("activity payload is empty")]
    EmptyPayload,
    #[error("worker {0} not found")]
    WorkerNotFound(WorkerId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
}
