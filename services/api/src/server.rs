use crate::cli::ServeArgs;
use crate::infra::{sample_providers, seed_marketplace, AppState};
use crate::routes::with_distribution_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use leadflow::config::AppConfig;
use leadflow::distribution::{LeadDistributionService, LoggingNotificationSink};
use leadflow::error::AppError;
use leadflow::telemetry;
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

    let providers = if args.no_seed {
        Vec::new()
    } else {
        sample_providers()
    };
    let provider_count = providers.len();
    let store = seed_marketplace(providers)?;
    let service = Arc::new(LeadDistributionService::new(
        store,
        Arc::new(LoggingNotificationSink),
        config.distribution.clone(),
    ));

    let app = with_distribution_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, providers = provider_count, "lead distribution service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
