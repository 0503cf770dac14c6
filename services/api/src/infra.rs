use chrono::{DateTime, Utc};
use gig_rewards::workflows::rewards::{
    ActivityRecord, AuditEntry, AuditLog, Benefit, BenefitId, BenefitRepository, BenefitState,
    ComparisonOperator, Condition, GroupLogic, MetricSnapshot, NewBenefit, NewRule,
    RepositoryError, RewardKind, RewardSpec, Rule, RuleId, RuleRepository, WorkerId,
    WorkerProfile, WorkerRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) const DEMO_WORKER_ID: &str = "worker-alex";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreState {
    workers: Vec<WorkerProfile>,
    activities: HashMap<WorkerId, Vec<ActivityRecord>>,
    rules: Vec<Rule>,
    benefits: Vec<Benefit>,
    rule_sequence: u32,
    benefit_sequence: u32,
}

/// Process-local store backing the demo server and CLI.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRewardsStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRewardsStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub(crate) fn insert_worker(&self, worker: WorkerProfile) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.workers.iter().any(|existing| existing.id == worker.id) {
            return Err(RepositoryError::Conflict);
        }
        state.workers.push(worker);
        Ok(())
    }
}

impl WorkerRepository for InMemoryRewardsStore {
    fn worker(&self, id: &WorkerId) -> Result<Option<WorkerProfile>, RepositoryError> {
        Ok(self
            .state()?
            .workers
            .iter()
            .find(|worker| &worker.id == id)
            .cloned())
    }

    fn workers(&self) -> Result<Vec<WorkerProfile>, RepositoryError> {
        Ok(self.state()?.workers.clone())
    }

    fn update_worker(&self, worker: WorkerProfile) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state
            .workers
            .iter_mut()
            .find(|existing| existing.id == worker.id)
        {
            Some(slot) => {
                *slot = worker;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn append_activities(
        &self,
        id: &WorkerId,
        activities: Vec<ActivityRecord>,
    ) -> Result<(), RepositoryError> {
        self.state()?
            .activities
            .entry(id.clone())
            .or_default()
            .extend(activities);
        Ok(())
    }

    fn activities(&self, id: &WorkerId) -> Result<Vec<ActivityRecord>, RepositoryError> {
        Ok(self
            .state()?
            .activities
            .get(id)
            .cloned()
            .unwrap_or_default())
    }
}

impl RuleRepository for InMemoryRewardsStore {
    fn rules(&self) -> Result<Vec<Rule>, RepositoryError> {
        let mut rules = self.state()?.rules.clone();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rules)
    }

    fn rule(&self, id: &RuleId) -> Result<Option<Rule>, RepositoryError> {
        Ok(self
            .state()?
            .rules
            .iter()
            .find(|rule| &rule.id == id)
            .cloned())
    }

    fn insert_rule(
        &self,
        rule: NewRule,
        updated_at: DateTime<Utc>,
    ) -> Result<Rule, RepositoryError> {
        let mut state = self.state()?;
        state.rule_sequence += 1;
        let created = Rule {
            id: RuleId(format!("rule-{:06}", state.rule_sequence)),
            name: rule.name,
            conditions: rule.conditions,
            group_logic: rule.group_logic,
            reward: rule.reward,
            active: true,
            updated_at,
        };
        state.rules.push(created.clone());
        Ok(created)
    }

    fn update_rule(&self, rule: Rule) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.rules.iter_mut().find(|existing| existing.id == rule.id) {
            Some(slot) => {
                *slot = rule;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl BenefitRepository for InMemoryRewardsStore {
    fn find_benefit(
        &self,
        worker: &WorkerId,
        rule: &RuleId,
        states: &[BenefitState],
    ) -> Result<Option<Benefit>, RepositoryError> {
        Ok(self
            .state()?
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
        let mut state = self.state()?;
        let open_grant_exists = state.benefits.iter().any(|existing| {
            existing.worker_id == benefit.worker_id
                && existing.source_rule_id == benefit.source_rule_id
                && existing.state.is_open()
        });
        if open_grant_exists {
            return Err(RepositoryError::Conflict);
        }

        state.benefit_sequence += 1;
        let created = Benefit {
            id: BenefitId(format!("benefit-{:06}", state.benefit_sequence)),
            worker_id: benefit.worker_id,
            title: benefit.title,
            partner: benefit.partner,
            validity: benefit.validity,
            state: BenefitState::Unlocked,
            source_rule_id: benefit.source_rule_id,
            created_at: benefit.created_at,
        };
        state.benefits.push(created.clone());
        Ok(created)
    }

    fn benefit(&self, id: &BenefitId) -> Result<Option<Benefit>, RepositoryError> {
        Ok(self
            .state()?
            .benefits
            .iter()
            .find(|benefit| &benefit.id == id)
            .cloned())
    }

    fn update_benefit(&self, benefit: Benefit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state
            .benefits
            .iter_mut()
            .find(|existing| existing.id == benefit.id)
        {
            Some(slot) => {
                *slot = benefit;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn benefits_for(&self, worker: &WorkerId) -> Result<Vec<Benefit>, RepositoryError> {
        Ok(self
            .state()?
            .benefits
            .iter()
            .filter(|benefit| &benefit.worker_id == worker)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditLog for InMemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .map_err(|_| RepositoryError::Unavailable("audit mutex poisoned".to_string()))?
            .push(entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<AuditEntry>, RepositoryError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| RepositoryError::Unavailable("audit mutex poisoned".to_string()))?
            .clone())
    }
}

/// Load the demo worker and the Silver Insurance rule.
pub(crate) fn seed_demo_data(store: &InMemoryRewardsStore) -> Result<Rule, RepositoryError> {
    let mut worker = WorkerProfile::new(
        WorkerId(DEMO_WORKER_ID.to_string()),
        "Alex Chen",
        "worker@demo.com",
    );
    worker.level = 2;
    worker.points = 1870;
    worker.metrics = MetricSnapshot {
        completed_orders_30d: 52,
        on_time_rate: 0.97,
        avg_rating_30d: 4.8,
        incidents_30d: 0,
    };
    worker.last_benefit = Some("Insurance Discount 20%".to_string());
    store.insert_worker(worker)?;

    store.insert_rule(
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
        },
        Utc::now(),
    )
}
