use crate::cli::ServeArgs;
use crate::infra::{seed_demo_data, AppState, InMemoryAuditLog, InMemoryRewardsStore};
use crate::routes::with_rewards_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use gig_rewards::config::AppConfig;
use gig_rewards::error::AppError;
use gig_rewards::telemetry;
use gig_rewards::workflows::rewards::{RewardsService, RewardsServiceError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryRewardsStore::default());
    let audit = Arc::new(InMemoryAuditLog::default());
    if !args.no_seed {
        let rule = seed_demo_data(&store).map_err(RewardsServiceError::from)?;
        info!(rule = %rule.id, "seeded demo worker and rule");
    }

    let rewards_service = Arc::new(RewardsService::new(store, audit, config.rewards));

    let app = with_rewards_routes(rewards_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "rewards engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
