use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::info;

use super::batch::{RecomputeDriver, RecomputeError, RecomputeSummary};
use super::domain::{
    audit_timestamp, ActivityKind, ActivityRecord, AuditAction, AuditActor, AuditEntry, Benefit,
    BenefitId, BenefitState, NewRule, Rule, RuleId, WorkerId, WorkerProfile, WorkerRole,
};
use super::engine::{IssuanceEngine, IssuanceError, IssuanceReport};
use super::evaluation::{combine, condition_gaps};
use super::ingestion::{ActivityIngestor, IngestionError, IngestionOutcome};
use super::repository::{AuditLog, RepositoryError, RewardsStore};
use super::reward::format_reward;
use super::views::{
    AvailableSoonView, BenefitsSummary, PreviewHit, RulePreview, RuleView, UnlockedBenefitView,
    WorkerSummary,
};
use crate::config::RewardsConfig;

/// Upper bound on rows returned by listing queries.
pub const LISTING_LIMIT: usize = 200;

/// Service composing the issuance engine, batch driver, ingestion path, and rule
/// administration over one store and audit log.
pub struct RewardsService<S, L> {
    store: Arc<S>,
    audit: Arc<L>,
    engine: Arc<IssuanceEngine<S, L>>,
    driver: RecomputeDriver<S, L>,
    ingestor: ActivityIngestor<S, L>,
}

impl<S, L> RewardsService<S, L>
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<L>, config: RewardsConfig) -> Self {
        let engine = Arc::new(IssuanceEngine::new(store.clone(), audit.clone()));
        let driver = RecomputeDriver::new(engine.clone(), store.clone(), audit.clone());
        let ingestor = ActivityIngestor::new(engine.clone(), store.clone(), audit.clone(), config);

        Self {
            store,
            audit,
            engine,
            driver,
            ingestor,
        }
    }

    pub fn evaluate_worker(
        &self,
        worker_id: &WorkerId,
    ) -> Result<IssuanceReport, RewardsServiceError> {
        Ok(self.engine.evaluate_worker(worker_id)?)
    }

    pub fn recompute_all(&self) -> Result<RecomputeSummary, RewardsServiceError> {
        Ok(self.driver.recompute_all()?)
    }

    pub fn ingest_activities(
        &self,
        worker_id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<IngestionOutcome, RewardsServiceError> {
        Ok(self.ingestor.ingest(worker_id, activities)?)
    }

    /// All rules, most recently updated first.
    pub fn rules(&self) -> Result<Vec<RuleView>, RewardsServiceError> {
        let mut rules = self.store.rules()?;
        rules.sort_by_key(|rule| Reverse(rule.updated_at));

        Ok(rules
            .into_iter()
            .map(|rule| {
                let condition_summary = rule.describe_conditions();
                let reward_title = format_reward(rule.reward.as_ref(), &rule.name).title;
                RuleView {
                    rule,
                    condition_summary,
                    reward_title,
                }
            })
            .collect())
    }

    pub fn create_rule(&self, rule: NewRule) -> Result<Rule, RewardsServiceError> {
        if rule.name.trim().is_empty() {
            return Err(RewardsServiceError::InvalidRule(
                "rule name is required".to_string(),
            ));
        }

        let now = Utc::now();
        let created = self.store.insert_rule(rule, now)?;

        self.audit.append(
            AuditEntry::new(AuditActor::Admin, AuditAction::RuleUpdated, now)
                .rule(created.name.clone())
                .details("Created rule"),
        )?;

        info!(rule = %created.id, name = %created.name, "rule created");
        Ok(created)
    }

    /// Set the rule's active flag, or flip it when `active` is `None`, then recompute every
    /// worker.
    pub fn set_rule_status(
        &self,
        rule_id: &RuleId,
        active: Option<bool>,
    ) -> Result<RuleStatusChange, RewardsServiceError> {
        let mut rule = self
            .store
            .rule(rule_id)?
            .ok_or_else(|| RewardsServiceError::RuleNotFound(rule_id.clone()))?;

        let now = Utc::now();
        rule.active = active.unwrap_or(!rule.active);
        rule.updated_at = now;
        self.store.update_rule(rule.clone())?;

        let details = if rule.active {
            "Enabled rule"
        } else {
            "Disabled rule"
        };
        self.audit.append(
            AuditEntry::new(AuditActor::Admin, AuditAction::RuleUpdated, now)
                .rule(rule.name.clone())
                .details(details),
        )?;

        info!(rule = %rule.id, active = rule.active, "rule status changed");

        let recompute = self.driver.recompute_all()?;
        Ok(RuleStatusChange { rule, recompute })
    }

    /// Workers whose current snapshot satisfies the rule, regardless of its active flag.
    pub fn preview_rule(&self, rule_id: &RuleId) -> Result<RulePreview, RewardsServiceError> {
        let rule = self
            .store
            .rule(rule_id)?
            .ok_or_else(|| RewardsServiceError::RuleNotFound(rule_id.clone()))?;

        let workers: Vec<PreviewHit> = self
            .store
            .workers()?
            .iter()
            .filter(|worker| worker.role == WorkerRole::Worker)
            .filter(|worker| combine(&rule, &worker.metrics))
            .map(PreviewHit::from)
            .collect();

        Ok(RulePreview {
            rule_id: rule.id,
            count: workers.len(),
            workers,
        })
    }

    pub fn claim_benefit(
        &self,
        worker_id: &WorkerId,
        benefit_id: &BenefitId,
    ) -> Result<Benefit, RewardsServiceError> {
        let mut benefit = self
            .store
            .benefit(benefit_id)?
            .filter(|benefit| &benefit.worker_id == worker_id)
            .ok_or_else(|| RewardsServiceError::BenefitNotFound(benefit_id.clone()))?;

        if benefit.state != BenefitState::Unlocked {
            return Err(RewardsServiceError::BenefitNotClaimable {
                id: benefit.id,
                state: benefit.state,
            });
        }

        benefit.state = BenefitState::Claimed;
        self.store.update_benefit(benefit.clone())?;
        info!(worker = %worker_id, benefit = %benefit.id, "benefit claimed");
        Ok(benefit)
    }

    /// Every benefit for the worker, newest first.
    pub fn benefits(&self, worker_id: &WorkerId) -> Result<Vec<Benefit>, RewardsServiceError> {
        self.require_worker(worker_id)?;
        let mut benefits = self.store.benefits_for(worker_id)?;
        benefits.sort_by_key(|benefit| Reverse(benefit.created_at));
        Ok(benefits)
    }

    /// Unlocked benefits plus active rules the worker is still short of.
    pub fn benefits_summary(
        &self,
        worker_id: &WorkerId,
    ) -> Result<BenefitsSummary, RewardsServiceError> {
        let worker = self.require_worker(worker_id)?;

        let unlocked = self
            .benefits(worker_id)?
            .into_iter()
            .filter(|benefit| benefit.state == BenefitState::Unlocked)
            .map(|benefit| UnlockedBenefitView {
                granted_at: audit_timestamp(benefit.created_at),
                id: benefit.id,
                title: benefit.title,
                partner: benefit.partner,
                validity: benefit.validity,
            })
            .collect();

        let available_soon = self
            .store
            .active_rules()?
            .into_iter()
            .filter(|rule| !combine(rule, &worker.metrics))
            .filter_map(|rule| {
                let missing = condition_gaps(&rule.conditions, &worker.metrics);
                if missing.is_empty() {
                    return None;
                }
                Some(AvailableSoonView {
                    title: format_reward(rule.reward.as_ref(), &rule.name).title,
                    rule_id: rule.id,
                    missing,
                })
            })
            .collect();

        Ok(BenefitsSummary {
            unlocked,
            available_soon,
        })
    }

    pub fn worker_summary(
        &self,
        worker_id: &WorkerId,
    ) -> Result<WorkerSummary, RewardsServiceError> {
        let worker = self.require_worker(worker_id)?;
        let next_unlock = self
            .benefits_summary(worker_id)?
            .available_soon
            .into_iter()
            .next();

        Ok(WorkerSummary {
            worker_id: worker.id,
            name: worker.name,
            points: worker.points,
            level: worker.level,
            kpis: worker.metrics,
            last_benefit: worker.last_benefit,
            next_unlock,
        })
    }

    /// Worker activity matching the query, newest first.
    pub fn activities(
        &self,
        worker_id: &WorkerId,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityRecord>, RewardsServiceError> {
        self.require_worker(worker_id)?;

        let mut activities: Vec<ActivityRecord> = self
            .store
            .activities(worker_id)?
            .into_iter()
            .rev()
            .filter(|activity| query.matches(activity))
            .collect();
        activities.sort_by_key(|activity| Reverse(activity.date));
        activities.truncate(LISTING_LIMIT);
        Ok(activities)
    }

    /// Worker accounts whose name contains `name_query`, ignoring case.
    pub fn workers(&self, name_query: &str) -> Result<Vec<WorkerProfile>, RewardsServiceError> {
        let needle = name_query.trim().to_lowercase();
        Ok(self
            .store
            .workers()?
            .into_iter()
            .filter(|worker| worker.role == WorkerRole::Worker)
            .filter(|worker| worker.name.to_lowercase().contains(&needle))
            .take(LISTING_LIMIT)
            .collect())
    }

    /// Audit entries matching the query, newest first.
    pub fn audit_entries(
        &self,
        query: &AuditQuery,
    ) -> Result<Vec<AuditEntry>, RewardsServiceError> {
        Ok(self
            .audit
            .entries()?
            .into_iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(LISTING_LIMIT)
            .collect())
    }

    fn require_worker(&self, worker_id: &WorkerId) -> Result<WorkerProfile, RewardsServiceError> {
        self.store
            .worker(worker_id)?
            .ok_or_else(|| RewardsServiceError::WorkerNotFound(worker_id.clone()))
    }
}

/// Outcome of toggling a rule, including the recompute it triggered.
#[derive(Debug)]
pub struct RuleStatusChange {
    pub rule: Rule,
    pub recompute: RecomputeSummary,
}

/// Filters for listing a worker's activity. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub kind: Option<ActivityKind>,
}

impl ActivityQuery {
    fn matches(&self, activity: &ActivityRecord) -> bool {
        self.from.map_or(true, |from| activity.date >= from)
            && self.to.map_or(true, |to| activity.date <= to)
            && self.kind.map_or(true, |kind| activity.kind == kind)
    }
}

/// Filters for the audit log.
///
/// Bounds compare against the minute-precision timestamp, truncated to the bound's length, so
/// `to = "2025-06-01"` includes every entry on that day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl AuditQuery {
    fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(from) = self.from.as_deref() {
            if entry.time.as_str() < from {
                return false;
            }
        }
        if let Some(to) = self.to.as_deref() {
            let prefix = entry.time.get(..to.len()).unwrap_or(entry.time.as_str());
            if prefix > to {
                return false;
            }
        }
        true
    }
}

/// Error raised by the rewards service.
#[derive(Debug, thiserror::Error)]
pub enum RewardsServiceError {
    #[error("invalid rule: {0}")]
    InvalidRule(String),
    #[error("rule {0} not found")]
    RuleNotFound(RuleId),
    #[error("worker {0} not found")]
    WorkerNotFound(WorkerId),
    #[error("benefit {0} not found")]
    BenefitNotFound(BenefitId),
    #[error("benefit {id} is {} and cannot be claimed", .state.label())]
    BenefitNotClaimable { id: BenefitId, state: BenefitState },
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Issuance(#[from] IssuanceError),
    #[error(transparent)]
    Recompute(#[from] RecomputeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
