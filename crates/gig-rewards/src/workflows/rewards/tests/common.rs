use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::config::RewardsConfig;
use crate::workflows::rewards::domain::{
    ActivityKind, ActivityRecord, AuditEntry, Benefit, BenefitId, BenefitState, ComparisonOperator,
    Condition, GroupLogic, MetricSnapshot, NewBenefit, NewRule, RewardKind, RewardSpec, Rule,
    RuleId, WorkerId, WorkerProfile, WorkerRole,
};
use crate::workflows::rewards::repository::{
    AuditLog, BenefitRepository, RepositoryError, RuleRepository, WorkerRepository,
};
use crate::workflows::rewards::{rewards_router, RewardsService};

pub(super) fn alex_id() -> WorkerId {
    WorkerId("worker-alex".to_string())
}

pub(super) fn alex() -> WorkerProfile {
    let mut worker = WorkerProfile::new(alex_id(), "Alex Chen", "worker@demo.com");
    worker.level = 2;
    worker.points = 1870;
    worker.metrics = MetricSnapshot {
        completed_orders_30d: 52,
        on_time_rate: 0.97,
        avg_rating_30d: 4.8,
        incidents_30d: 0,
    };
    worker
}

pub(super) fn newcomer() -> WorkerProfile {
    WorkerProfile::new(
        WorkerId("worker-sam".to_string()),
        "Sam Rivera",
        "sam@demo.com",
    )
}

pub(super) fn admin() -> WorkerProfile {
    let mut admin = WorkerProfile::new(
        WorkerId("admin-1".to_string()),
        "Ops Admin",
        "admin@demo.com",
    );
    admin.role = WorkerRole::Admin;
    admin.metrics = alex().metrics;
    admin
}

pub(super) fn silver_insurance() -> NewRule {
    NewRule {
        name: "Silver Insurance".to_string(),
        conditions: vec![
            Condition::new("completed_orders_30d", ComparisonOperator::AtLeast, 50.0),
            Condition::new("on_time_rate", ComparisonOperator::AtLeast, 0.95),
        ],
        group_logic: GroupLogic::And,
        reward: Some(RewardSpec {
            kind: RewardKind::InsuranceDiscount,
            value: "20".to_string(),
            duration_days: Some(30),
        }),
    }
}

pub(super) fn tax_consult() -> NewRule {
    NewRule {
        name: "Tax Desk".to_string(),
        conditions: vec![Condition::new(
            "rating_avg_30d",
            ComparisonOperator::AtLeast,
            4.5,
        )],
        group_logic: GroupLogic::And,
        reward: Some(RewardSpec {
            kind: RewardKind::TaxConsultation,
            value: "1".to_string(),
            duration_days: None,
        }),
    }
}

pub(super) fn gold_early_pay() -> NewRule {
    NewRule {
        name: "Gold Early Pay".to_string(),
        conditions: vec![
            Condition::new("completed_orders_30d", ComparisonOperator::AtLeast, 80.0),
            Condition::new("incidents_30d", ComparisonOperator::AtMost, 0.0),
        ],
        group_logic: GroupLogic::And,
        reward: Some(RewardSpec {
            kind: RewardKind::EarlyPayLimit,
            value: "300".to_string(),
            duration_days: Some(14),
        }),
    }
}

pub(super) fn activity(date: &str, kind: ActivityKind, on_time: bool, rating: f64) -> ActivityRecord {
    ActivityRecord {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid date"),
        kind,
        on_time,
        rating,
        distance_km: 3.5,
        incidents: 0,
    }
}

pub(super) fn build_service() -> (
    RewardsService<MemoryStore, MemoryAudit>,
    Arc<MemoryStore>,
    Arc<MemoryAudit>,
) {
    let store = Arc::new(MemoryStore::default());
    let audit = Arc::new(MemoryAudit::default());
    let service = RewardsService::new(store.clone(), audit.clone(), RewardsConfig::default());
    (service, store, audit)
}

pub(super) fn rewards_router_with_service(
    service: RewardsService<MemoryStore, MemoryAudit>,
) -> axum::Router {
    rewards_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default)]
struct StoreState {
    workers: Vec<WorkerProfile>,
    activities: HashMap<WorkerId, Vec<ActivityRecord>>,
    rules: Vec<Rule>,
    benefits: Vec<Benefit>,
    next_rule: u32,
    next_benefit: u32,
}

/// In-memory store with switches for injecting worker lookup and benefit write failures.
#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    failing_rules: Arc<Mutex<Vec<RuleId>>>,
    failing_workers: Arc<Mutex<Vec<WorkerId>>>,
}

impl MemoryStore {
    pub(super) fn seed_worker(&self, worker: WorkerProfile) {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .workers
            .push(worker);
    }

    pub(super) fn seed_rule(&self, rule: NewRule) -> Rule {
        self.insert_rule(rule, Utc::now()).expect("insert rule")
    }

    pub(super) fn seed_rule_at(&self, rule: NewRule, at: DateTime<Utc>) -> Rule {
        self.insert_rule(rule, at).expect("insert rule")
    }

    /// Make `create_benefit` fail for the given rule.
    pub(super) fn fail_benefits_for(&self, rule: &RuleId) {
        self.failing_rules
            .lock()
            .expect("store mutex poisoned")
            .push(rule.clone());
    }

    /// Make `worker` fail for the given id while `workers` still lists it.
    pub(super) fn fail_lookups_for(&self, worker: &WorkerId) {
        self.failing_workers
            .lock()
            .expect("store mutex poisoned")
            .push(worker.clone());
    }

    pub(super) fn all_benefits(&self) -> Vec<Benefit> {
        self.state
            .lock()
            .expect("store mutex poisoned")
            .benefits
            .clone()
    }
}

impl WorkerRepository for MemoryStore {
    fn worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError> {
        if self
            .failing_workers
            .lock()
            .expect("store mutex poisoned")
            .contains(id)
        {
            return Err(RepositoryError::Unavailable("worker shard offline".to_string()));
        }

        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.workers.iter().find(|worker| &worker.id == id).cloned())
    }

    fn workers(&self) -> Result<Vec<WorkerProfile>, RepositoryError> {
        Ok(self.state.lock().expect("store mutex poisoned").workers.clone())
    }

    fn update_worker(&self, worker: WorkerProfile) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let slot = guard
            .workers
            .iter_mut()
            .find(|existing| existing.id == worker.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = worker;
        Ok(())
    }

    fn append_activities(
        &self,
        id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        guard
            .activities
            .entry(id.clone())
            .or_default()
            .extend(activities);
        Ok(())
    }

    fn activities(&self, id: &WorkerId) -> Result<Vec<ActivityRecord>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.activities.get(id).cloned().unwrap_or_default())
    }
}

impl RuleRepository for MemoryStore {
    fn rules(&self) -> Result<Vec<Rule>, RepositoryError> {
        Ok(self.state.lock().expect("store mutex poisoned").rules.clone())
    }

    fn rule(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.rules.iter().find(|rule| &rule.id == id).cloned())
    }

    fn insert_rule(
        &self,
        rule: NewRule,
        updated_at: DateTime<Utc>,
    ) -> Result<Rule, RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        guard.next_rule += 1;
        let rule = Rule {
            id: RuleId(format!("rule-{:06}", guard.next_rule)),
            name: rule.name,
            conditions: rule.conditions,
            group_logic: rule.group_logic,
            reward: rule.reward,
            active: true,
            updated_at,
        };
        guard.rules.push(rule.clone());
        Ok(rule)
    }

    fn update_rule(&self, rule: Rule) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let slot = guard
            .rules
            .iter_mut()
            .find(|existing| existing.id == rule.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = rule;
        Ok(())
    }
}

impl BenefitRepository for MemoryStore {
    fn find_benefit(
        &self,
        worker: &WorkerId,
        rule: &RuleId,
        states: &[BenefitState],
    ) -> Result<Option<Benefit>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .benefits
            .iter()
            .find(|benefit| {
                &benefit.worker_id == worker
                    && &benefit.source_rule_id == rule
                    && states.contains(&benefit.state)
            })
            .cloned())
    }

    fn create_benefit(&self, benefit: NewBenefit) -> Result<Benefit, RepositoryError> {
        if self
            .failing_rules
            .lock()
            .expect("store mutex poisoned")
            .contains(&benefit.source_rule_id)
        {
            return Err(RepositoryError::Unavailable("benefit table locked".to_string()));
        }

        let mut guard = self.state.lock().expect("store mutex poisoned");
        let duplicate = guard.benefits.iter().any(|existing| {
            existing.worker_id == benefit.worker_id
                && existing.source_rule_id == benefit.source_rule_id
                && existing.state.is_open()
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        guard.next_benefit += 1;
        let created = Benefit {
            id: BenefitId(format!("benefit-{:06}", guard.next_benefit)),
            worker_id: benefit.worker_id,
            title: benefit.title,
            partner: benefit.partner,
            validity: benefit.validity,
            state: BenefitState::Unlocked,
            source_rule_id: benefit.source_rule_id,
            created_at: benefit.created_at,
        };
        guard.benefits.push(created.clone());
        Ok(created)
    }

    fn benefit(&self, id: &BenefitId) -> Result<Option<Benefit>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard.benefits.iter().find(|benefit| &benefit.id == id).cloned())
    }

    fn update_benefit(&self, benefit: Benefit) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("store mutex poisoned");
        let slot = guard
            .benefits
            .iter_mut()
            .find(|existing| existing.id == benefit.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = benefit;
        Ok(())
    }

    fn benefits_for(&self, worker: &WorkerId) -> Result<Vec<Benefit>, RepositoryError> {
        let guard = self.state.lock().expect("store mutex poisoned");
        Ok(guard
            .benefits
            .iter()
            .filter(|benefit| &benefit.worker_id == worker)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn recorded(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditLog for MemoryAudit {
    fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self.recorded())
    }
}

pub(super) struct UnavailableAudit;

impl AuditLog for UnavailableAudit {
    fn append(&self, _entry: AuditEntry) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("audit sink offline".to_string()))
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("audit sink offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl WorkerRepository for UnavailableStore {
    fn worker(&self, _id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn workers(&self) -> Result<Vec<WorkerProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_worker(&self, _worker: WorkerProfile) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn append_activities(
        &self,
        _id: &WorkerId,
        _activities: Vec<ActivityRecord>,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn activities(&self, _id: &WorkerId) -> Result<Vec<ActivityRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl RuleRepository for UnavailableStore {
    fn rules(&self) -> Result<Vec<Rule>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn rule(&self, _id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_rule(
        &self,
        _rule: NewRule,
        _updated_at: DateTime<Utc>,
    ) -> Result<Rule, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_rule(&self, _rule: Rule) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl BenefitRepository for UnavailableStore {
    fn find_benefit(
        &self,
        _worker: &WorkerId,
        _rule: &RuleId,
        _states: &[BenefitState],
    ) -> Result<Option<Benefit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn create_benefit(&self, _benefit: NewBenefit) -> Result<Benefit, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn benefit(&self, _id: &BenefitId) -> Result<Option<Benefit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_benefit(&self, _benefit: Benefit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn benefits_for(&self, _worker: &WorkerId) -> Result<Vec<Benefit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}
