use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier wrapper for workers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub String);

/// Identifier wrapper for eligibility rules. Rule listings are ordered by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Identifier wrapper for issued benefits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenefitId(pub String);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for BenefitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rolling performance aggregates for a single worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub completed_orders_30d: u32,
    pub on_time_rate: f64,
    pub avg_rating_30d: f64,
    pub incidents_30d: u32,
}

impl MetricSnapshot {
    /// Resolve a metric by key. Unknown metrics read as zero.
    pub fn value(&self, metric: &MetricKey) -> f64 {
        match metric {
            MetricKey::CompletedOrders30d => f64::from(self.completed_orders_30d),
            MetricKey::OnTimeRate => self.on_time_rate,
            MetricKey::AvgRating30d => self.avg_rating_30d,
            MetricKey::Incidents30d => f64::from(self.incidents_30d),
            MetricKey::Unrecognized(_) => 0.0,
        }
    }
}

/// Snapshot field a condition refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKey {
    CompletedOrders30d,
    OnTimeRate,
    AvgRating30d,
    Incidents30d,
    Unrecognized(String),
}

impl MetricKey {
    pub fn as_str(&self) -> &str {
        match self {
            MetricKey::CompletedOrders30d => "completed_orders_30d",
            MetricKey::OnTimeRate => "on_time_rate",
            MetricKey::AvgRating30d => "rating_avg_30d",
            MetricKey::Incidents30d => "incidents_30d",
            MetricKey::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for MetricKey {
    fn from(value: String) -> Self {
        match value.trim() {
            "completed_orders_30d" | "completedOrders30d" => MetricKey::CompletedOrders30d,
            "on_time_rate" | "onTimeRate" => MetricKey::OnTimeRate,
            "rating_avg_30d" | "avg_rating_30d" | "avgRating30d" => MetricKey::AvgRating30d,
            "incidents_30d" | "incidents30d" => MetricKey::Incidents30d,
            _ => MetricKey::Unrecognized(value),
        }
    }
}

impl From<&str> for MetricKey {
    fn from(value: &str) -> Self {
        MetricKey::from(value.to_string())
    }
}

impl From<MetricKey> for String {
    fn from(value: MetricKey) -> Self {
        value.as_str().to_string()
    }
}

/// Comparison applied between a metric and a condition threshold.
///
/// Operators arriving over the wire that are not one of `≥`, `≤`, `=` are kept as
/// `Unrecognized` and never hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonOperator {
    AtLeast,
    AtMost,
    Equal,
    Unrecognized(String),
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &str {
        match self {
            ComparisonOperator::AtLeast => "≥",
            ComparisonOperator::AtMost => "≤",
            ComparisonOperator::Equal => "=",
            ComparisonOperator::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for ComparisonOperator {
    fn from(value: String) -> Self {
        match value.trim() {
            "≥" | ">=" => ComparisonOperator::AtLeast,
            "≤" | "<=" => ComparisonOperator::AtMost,
            "=" | "==" => ComparisonOperator::Equal,
            _ => ComparisonOperator::Unrecognized(value),
        }
    }
}

impl From<ComparisonOperator> for String {
    fn from(value: ComparisonOperator) -> Self {
        value.symbol().to_string()
    }
}

/// Single comparison of a snapshot metric against a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: MetricKey,
    #[serde(alias = "op")]
    pub operator: ComparisonOperator,
    #[serde(alias = "val", deserialize_with = "lenient_threshold")]
    pub threshold: f64,
}

impl Condition {
    pub fn new(metric: impl Into<MetricKey>, operator: ComparisonOperator, threshold: f64) -> Self {
        Self {
            metric: metric.into(),
            operator,
            threshold,
        }
    }

    /// Human-readable rendering, e.g. `completed_orders_30d ≥ 50`.
    pub fn describe(&self) -> String {
        format!(
            "{} {} {}",
            self.metric.as_str(),
            self.operator.symbol(),
            self.threshold
        )
    }
}

/// Thresholds may be authored as numbers or numeric strings. Anything unparsable becomes NaN,
/// which fails every comparison.
fn lenient_threshold<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawThreshold {
        Number(f64),
        Text(String),
    }

    Ok(match RawThreshold::deserialize(deserializer)? {
        RawThreshold::Number(value) => value,
        RawThreshold::Text(text) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
    })
}

/// Combinator across a rule's conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum GroupLogic {
    #[default]
    And,
    Or,
}

impl GroupLogic {
    pub fn label(&self) -> &'static str {
        match self {
            GroupLogic::And => "AND",
            GroupLogic::Or => "OR",
        }
    }
}

impl From<String> for GroupLogic {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("or") {
            GroupLogic::Or
        } else {
            GroupLogic::And
        }
    }
}

impl From<GroupLogic> for &'static str {
    fn from(value: GroupLogic) -> Self {
        value.label()
    }
}

/// Category of reward attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RewardKind {
    InsuranceDiscount,
    TaxConsultation,
    EarlyPayLimit,
    Unrecognized(String),
}

impl RewardKind {
    pub fn as_str(&self) -> &str {
        match self {
            RewardKind::InsuranceDiscount => "insurance_discount",
            RewardKind::TaxConsultation => "tax_consultation",
            RewardKind::EarlyPayLimit => "early_pay_limit",
            RewardKind::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for RewardKind {
    fn from(value: String) -> Self {
        match value.trim() {
            "insurance_discount" => RewardKind::InsuranceDiscount,
            "tax_consultation" => RewardKind::TaxConsultation,
            "early_pay_limit" => RewardKind::EarlyPayLimit,
            _ => RewardKind::Unrecognized(value),
        }
    }
}

impl From<RewardKind> for String {
    fn from(value: RewardKind) -> Self {
        value.as_str().to_string()
    }
}

/// Reward descriptor granted when a rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSpec {
    #[serde(rename = "type", alias = "kind")]
    pub kind: RewardKind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub duration_days: Option<u32>,
}

/// Administrator-authored eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub conditions: Vec<Condition>,
    pub group_logic: GroupLogic,
    pub reward: Option<RewardSpec>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Conditions rendered and joined by the rule's combinator.
    pub fn describe_conditions(&self) -> String {
        let separator = format!(" {} ", self.group_logic.label());
        self.conditions
            .iter()
            .map(Condition::describe)
            .collect::<Vec<_>>()
            .join(separator.as_str())
    }
}

/// Payload used to author a new rule. New rules start active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, alias = "groupLogic")]
    pub group_logic: GroupLogic,
    #[serde(default)]
    pub reward: Option<RewardSpec>,
}

/// Lifecycle of an issued benefit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BenefitState {
    Unlocked,
    Claimed,
    Expired,
}

impl BenefitState {
    /// States that block re-issuance from the same rule.
    pub const OPEN: [BenefitState; 2] = [BenefitState::Unlocked, BenefitState::Claimed];

    pub fn is_open(&self) -> bool {
        Self::OPEN.contains(self)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BenefitState::Unlocked => "Unlocked",
            BenefitState::Claimed => "Claimed",
            BenefitState::Expired => "Expired",
        }
    }
}

/// Granted reward instance tied to the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Benefit {
    pub id: BenefitId,
    pub worker_id: WorkerId,
    pub title: String,
    pub partner: String,
    pub validity: String,
    pub state: BenefitState,
    pub source_rule_id: RuleId,
    pub created_at: DateTime<Utc>,
}

/// Fields required to persist a freshly issued benefit. Stores assign the id and create the
/// record in the `Unlocked` state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBenefit {
    pub worker_id: WorkerId,
    pub source_rule_id: RuleId,
    pub title: String,
    pub partner: String,
    pub validity: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Worker,
    Admin,
}

/// Account record for a worker, including the current metric snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: WorkerId,
    pub name: String,
    pub email: String,
    pub role: WorkerRole,
    pub level: u32,
    pub points: u32,
    pub metrics: MetricSnapshot,
    pub last_benefit: Option<String>,
}

impl WorkerProfile {
    /// New worker with zeroed metrics.
    pub fn new(id: WorkerId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role: WorkerRole::Worker,
            level: 1,
            points: 0,
            metrics: MetricSnapshot::default(),
            last_benefit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Order,
    Shift,
    Delivery,
}

impl ActivityKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "order" => Some(ActivityKind::Order),
            "shift" => Some(ActivityKind::Shift),
            "delivery" => Some(ActivityKind::Delivery),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Order => "order",
            ActivityKind::Shift => "shift",
            ActivityKind::Delivery => "delivery",
        }
    }
}

/// One uploaded unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub date: NaiveDate,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ActivityKind,
    #[serde(default)]
    pub on_time: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default)]
    pub incidents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditActor {
    Engine,
    Admin,
}

impl AuditActor {
    pub fn label(&self) -> &'static str {
        match self {
            AuditActor::Engine => "engine",
            AuditActor::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    BenefitIssued,
    RuleUpdated,
    Recompute,
}

impl AuditAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "benefit_issued" => Some(AuditAction::BenefitIssued),
            "rule_updated" => Some(AuditAction::RuleUpdated),
            "recompute" => Some(AuditAction::Recompute),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditAction::BenefitIssued => "benefit_issued",
            AuditAction::RuleUpdated => "rule_updated",
            AuditAction::Recompute => "recompute",
        }
    }
}

/// Immutable audit trail record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: AuditActor,
    pub action: AuditAction,
    pub worker_name: String,
    pub rule_name: String,
    pub benefit_title: String,
    pub details: String,
    pub time: String,
}

/// Placeholder used for audit fields that do not apply to an entry.
pub const AUDIT_PLACEHOLDER: &str = "-";

impl AuditEntry {
    pub fn new(actor: AuditActor, action: AuditAction, at: DateTime<Utc>) -> Self {
        Self {
            actor,
            action,
            worker_name: AUDIT_PLACEHOLDER.to_string(),
            rule_name: AUDIT_PLACEHOLDER.to_string(),
            benefit_title: AUDIT_PLACEHOLDER.to_string(),
            details: String::new(),
            time: audit_timestamp(at),
        }
    }

    pub fn worker(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn rule(mut self, name: impl Into<String>) -> Self {
        self.rule_name = name.into();
        self
    }

    pub fn benefit(mut self, title: impl Into<String>) -> Self {
        self.benefit_title = title.into();
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }
}

/// Minute-precision timestamp (`YYYY-MM-DD HH:MM`) used by the audit log.
pub fn audit_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}
