use brand_auth_service::{
    build_router,
    config::ServiceConfig,
    db,
    services::{
        AdminAllowList, AdminGuard, OtpService, PgStore, SessionService, SmtpEmailService,
        SystemClock,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::middleware::rate_limit::{create_ip_rate_limiter, create_keyed_rate_limiter};
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ServiceConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    brand_auth_service::services::metrics::init_metrics()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to init metrics: {}", e)))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting brand auth service"
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Migration failed: {}", e)))?;
    let store = Arc::new(PgStore::new(pool));

    let email = Arc::new(SmtpEmailService::new(
        &config.smtp,
        config.otp.dependency_timeout(),
    )?);

    let allow_list = AdminAllowList::from_csv(&config.admin_emails);
    tracing::info!(admins = allow_list.len(), "Admin allow-list loaded");
    let admin_guard = AdminGuard::new(allow_list);

    let sessions = SessionService::new(&config.session);
    let otp = OtpService::new(
        store.clone(),
        store.clone(),
        email,
        Arc::new(SystemClock),
        sessions.clone(),
        &config.otp,
    );

    let otp_request_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.otp_request_attempts,
        config.rate_limit.otp_request_window_seconds,
    );
    let otp_verify_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.otp_verify_attempts,
        config.rate_limit.otp_verify_window_seconds,
    );
    let otp_verify_email_rate_limiter = create_keyed_rate_limiter(
        config.rate_limit.otp_verify_email_attempts,
        config.rate_limit.otp_verify_email_window_seconds,
    );
    let ip_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.global_ip_limit,
        config.rate_limit.global_ip_window_seconds,
    );

    let sweeper = match config.otp.purge_interval_seconds {
        0 => {
            tracing::info!("Background purge of login codes disabled");
            None
        }
        secs => {
            tracing::info!(every_seconds = secs, "Background purge of login codes enabled");
            Some(otp.spawn_sweeper(Duration::from_secs(secs)))
        }
    };

    let state = AppState {
        config: config.clone(),
        admin_guard,
        sessions,
        otp,
        brands: store,
        otp_request_rate_limiter,
        otp_verify_rate_limiter,
        otp_verify_email_rate_limiter,
        ip_rate_limiter,
    };
    let app = build_router(state).await?;

    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
