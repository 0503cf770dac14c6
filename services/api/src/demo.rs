use crate::infra::{seed_demo_data, InMemoryAuditLog, InMemoryRewardsStore, DEMO_WORKER_ID};
use clap::Args;
use gig_rewards::config::AppConfig;
use gig_rewards::error::AppError;
use gig_rewards::workflows::rewards::views::BenefitsSummary;
use gig_rewards::workflows::rewards::{
    ActivityCsvImporter, AuditQuery, ComparisonOperator, Condition, GroupLogic, IngestionOutcome,
    NewRule, RewardKind, RewardSpec, RewardsService, RewardsServiceError, WorkerId,
};
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = RewardsService<InMemoryRewardsStore, InMemoryAuditLog>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional activity CSV (date,type,on_time,rating,distance_km,incidents) to upload for the
    /// demo worker.
    #[arg(long)]
    pub(crate) activities_csv: Option<PathBuf>,
    /// Leave issued benefits unclaimed.
    #[arg(long)]
    pub(crate) skip_claim: bool,
}

#[derive(Args, Debug)]
pub(crate) struct IngestArgs {
    /// Worker to upload activity for
    #[arg(long, default_value = DEMO_WORKER_ID)]
    pub(crate) worker: String,
    /// Activity CSV export (date,type,on_time,rating,distance_km,incidents)
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        activities_csv,
        skip_claim,
    } = args;

    let service = seeded_service()?;
    let worker_id = WorkerId(DEMO_WORKER_ID.to_string());

    println!("Gig rewards demo");
    let summary = service.worker_summary(&worker_id)?;
    println!(
        "- {} | level {} | {} points",
        summary.name, summary.level, summary.points
    );
    println!(
        "  KPIs: {} orders | {:.0}% on time | rating {:.2} | {} incidents",
        summary.kpis.completed_orders_30d,
        summary.kpis.on_time_rate * 100.0,
        summary.kpis.avg_rating_30d,
        summary.kpis.incidents_30d
    );

    println!("\nEvaluation");
    let report = service.evaluate_worker(&worker_id)?;
    println!("- first pass issued {} benefit(s)", report.issued.len());
    let repeat = service.evaluate_worker(&worker_id)?;
    println!(
        "- second pass issued {} benefit(s) (open grants are not re-issued)",
        repeat.issued.len()
    );

    if let Some(path) = activities_csv {
        let activities = ActivityCsvImporter::from_path(&path)?;
        println!("\nActivity upload from {}", path.display());
        let outcome = service.ingest_activities(&worker_id, activities)?;
        render_ingestion(&outcome);
    }

    if !skip_claim {
        if let Some(benefit_id) = report.issued.first() {
            let claimed = service.claim_benefit(&worker_id, benefit_id)?;
            println!("\nClaimed {} -> {}", claimed.title, claimed.state.label());
        }
    }

    println!("\nAdmin: new rule");
    let gold = service.create_rule(gold_early_pay())?;
    let preview = service.preview_rule(&gold.id)?;
    println!(
        "- {} ({}) would match {} worker(s) today",
        gold.name,
        gold.describe_conditions(),
        preview.count
    );
    render_benefits_summary(&service.benefits_summary(&worker_id)?);

    println!("\nAdmin: disable and recompute");
    let change = service.set_rule_status(&gold.id, Some(false))?;
    println!(
        "- {} is now {} | recomputed {} worker(s), issued {}",
        change.rule.name,
        if change.rule.active { "active" } else { "inactive" },
        change.recompute.workers_evaluated,
        change.recompute.benefits_issued
    );

    render_audit_log(&service)?;
    Ok(())
}

pub(crate) fn run_ingest(args: IngestArgs) -> Result<(), AppError> {
    let IngestArgs { worker, csv } = args;

    let service = seeded_service()?;
    let activities = ActivityCsvImporter::from_path(&csv)?;
    let worker_id = WorkerId(worker);

    let outcome = service.ingest_activities(&worker_id, activities)?;
    println!("Activity upload for {worker_id} from {}", csv.display());
    render_ingestion(&outcome);

    let benefits = service.benefits(&worker_id)?;
    if benefits.is_empty() {
        println!("\nBenefits: none");
    } else {
        println!("\nBenefits");
        for benefit in &benefits {
            println!(
                "- {} [{}] {} {}",
                benefit.title,
                benefit.state.label(),
                benefit.partner,
                benefit.validity
            );
        }
    }

    Ok(())
}

fn seeded_service() -> Result<DemoService, AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(InMemoryRewardsStore::default());
    seed_demo_data(&store).map_err(RewardsServiceError::from)?;
    Ok(RewardsService::new(
        store,
        Arc::new(InMemoryAuditLog::default()),
        config.rewards,
    ))
}

fn gold_early_pay() -> NewRule {
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

fn render_ingestion(outcome: &IngestionOutcome) {
    println!(
        "- accepted {} activities | +{} points",
        outcome.accepted, outcome.points_awarded
    );
    println!(
        "- snapshot: {} orders | {:.0}% on time | rating {:.2} | {} incidents",
        outcome.snapshot.completed_orders_30d,
        outcome.snapshot.on_time_rate * 100.0,
        outcome.snapshot.avg_rating_30d,
        outcome.snapshot.incidents_30d
    );
    println!("- issued {} benefit(s)", outcome.issuance.issued.len());
    for failure in &outcome.issuance.failures {
        println!("  ! {}", failure.summary());
    }
}

fn render_benefits_summary(summary: &BenefitsSummary) {
    if summary.unlocked.is_empty() {
        println!("- unlocked: none");
    } else {
        for benefit in &summary.unlocked {
            println!(
                "- unlocked: {} ({}, {})",
                benefit.title, benefit.partner, benefit.validity
            );
        }
    }
    for soon in &summary.available_soon {
        println!("- available soon: {}", soon.title);
        for gap in &soon.missing {
            println!(
                "    {} {} {} (current {}, short by {})",
                gap.metric, gap.operator, gap.need, gap.current, gap.gap
            );
        }
    }
}

fn render_audit_log(service: &DemoService) -> Result<(), AppError> {
    println!("\nAudit log (newest first)");
    for entry in service.audit_entries(&AuditQuery::default())? {
        println!(
            "- {} [{}/{}] worker={} rule={} benefit={} {}",
            entry.time,
            entry.actor.label(),
            entry.action.label(),
            entry.worker_name,
            entry.rule_name,
            entry.benefit_title,
            entry.details
        );
    }
    Ok(())
}
