use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_ops_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sgics::catalog::import_geography_path;
use sgics::config::AppConfig;
use sgics::error::AppError;
use sgics::notifications::TracingMailer;
use sgics::telemetry;
use sgics::{Backend, BackendOptions};
use std::sync::atomic::{AtomicBool, Ordering};
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

    let backend = Backend::in_memory(BackendOptions::from_config(
        &config,
        Arc::new(TracingMailer),
    ));
    if let Some(path) = &config.geography_csv {
        let summary = import_geography_path(&backend.catalog, path)?;
        info!(
            path = %path.display(),
            communes = summary.communes_created,
            "geography catalog seeded"
        );
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_ops_routes(backend.router())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_dir = %config.uploads.directory.display(),
        "course administration backend ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
