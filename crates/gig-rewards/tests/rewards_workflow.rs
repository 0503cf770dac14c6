use chrono::Utc;
use gig_rewards::workflows::rewards::{
    combine, condition_gaps, format_reward, snapshot_from_activities, ActivityCsvImporter,
    ActivityImportError, ActivityKind, ComparisonOperator, Condition, GroupLogic, RewardKind,
    RewardSpec, Rule, RuleId,
};

fn silver_insurance() -> Rule {
    Rule {
        id: RuleId("rule-silver".to_string()),
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
        active: true,
        updated_at: Utc::now(),
    }
}

#[test]
fn demo_export_folds_into_a_sixty_activity_snapshot() {
    let data = include_bytes!("../fixtures/demo_activities.csv");
    let activities = ActivityCsvImporter::from_reader(&data[..]).expect("fixture imports");
    assert_eq!(activities.len(), 64);
    assert_eq!(activities[0].kind, ActivityKind::Order);
    assert!(!activities[0].on_time);

    let snapshot = snapshot_from_activities(&activities, 60);

    assert_eq!(snapshot.completed_orders_30d, 60);
    assert!((snapshot.on_time_rate - 53.0 / 60.0).abs() < 1e-9);
    assert_eq!(snapshot.avg_rating_30d, 4.8);
    assert_eq!(snapshot.incidents_30d, 0, "oldest incident falls outside the window");
}

#[test]
fn demo_export_misses_silver_insurance_on_punctuality() {
    let data = include_bytes!("../fixtures/demo_activities.csv");
    let activities = ActivityCsvImporter::from_reader(&data[..]).expect("fixture imports");
    let snapshot = snapshot_from_activities(&activities, 60);
    let rule = silver_insurance();

    assert!(!combine(&rule, &snapshot));

    let gaps = condition_gaps(&rule.conditions, &snapshot);
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].metric, "on_time_rate");
    assert!((gaps[0].gap - (0.95 - 53.0 / 60.0)).abs() < 1e-9);

    let display = format_reward(rule.reward.as_ref(), &rule.name);
    assert_eq!(display.title, "Insurance Discount 20%");
    assert_eq!(display.validity, "30 days");
}

#[test]
fn importer_reports_the_row_with_a_bad_date() {
    let csv = "date,type,on_time,rating,distance_km,incidents\n\
2025-06-01,order,yes,4.9,2.0,0\n\
06/02/2025,delivery,no,4.1,3.0,0\n";

    match ActivityCsvImporter::from_reader(csv.as_bytes()) {
        Err(ActivityImportError::InvalidDate { row, value }) => {
            assert_eq!(row, 2);
            assert_eq!(value, "06/02/2025");
        }
        other => panic!("expected invalid date, got {other:?}"),
    }
}

#[test]
fn importer_rejects_unknown_activity_types() {
    let csv = "date,type,on_time,rating,distance_km,incidents\n\
2025-06-01,flight,true,4.9,2.0,0\n";

    assert!(matches!(
        ActivityCsvImporter::from_reader(csv.as_bytes()),
        Err(ActivityImportError::Csv(_))
    ));
}
