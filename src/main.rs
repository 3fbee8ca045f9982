use std::net::SocketAddr;
use std::sync::Arc;

use anemi_meets::{
    app_state::AppState,
    config::Config,
    database::init::init_db,
    notifications::{
        smtp::SmtpProvider,
        worker::{NotificationWorker, RetryPolicy},
        EmailProvider, LogProvider, Notifier,
    },
    repositories::{
        cafe_repository::{CafeDirectory, MemoryCafeDirectory, PgCafeDirectory},
        invitation_repository::{InviteRepository, PgInviteRepository},
        memory_repository::MemoryInviteRepository,
    },
    routes::app_routes::create_router,
    services::{
        clock::SystemClock,
        housekeeping::spawn_lapsed_invite_sweep,
        invitation_service::{InviteService, InviteSettings},
        jwt_service::JwtKeys,
        rate_limiter::SlidingWindowLimiter,
    },
};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return;
        }
    };

    // Storage: Postgres when configured, otherwise the in-process store
    let (invites, cafes): (Arc<dyn InviteRepository>, Arc<dyn CafeDirectory>) = match &config.database_url {
        Some(url) => match init_db(url, config.db_timeout).await {
            Ok(pool) => {
                info!("Database initialized successfully");
                (
                    Arc::new(PgInviteRepository::new(pool.clone())),
                    Arc::new(PgCafeDirectory::new(pool)),
                )
            }
            Err(e) => {
                error!(error = %e, "Error initializing the database");
                return;
            }
        },
        None => {
            warn!("DATABASE_URL not set, invites are kept in memory only");
            (
                Arc::new(MemoryInviteRepository::new()),
                Arc::new(MemoryCafeDirectory::default()),
            )
        }
    };

    let provider: Arc<dyn EmailProvider> = match &config.smtp {
        Some(smtp) => match SmtpProvider::new(
            &smtp.host,
            smtp.port,
            smtp.username.clone(),
            smtp.password.clone(),
            &config.mail_from,
        ) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                error!(error = %e, "invalid mail configuration");
                return;
            }
        },
        None => {
            info!("SMTP_HOST not set, notification mails go to the log");
            Arc::new(LogProvider)
        }
    };

    let (notifier, queue) = Notifier::channel(config.notify_queue_capacity);
    let policy = RetryPolicy {
        max_attempts: config.notify_max_attempts,
        ..RetryPolicy::default()
    };
    NotificationWorker::new(provider, cafes, policy).spawn(queue);

    let settings = InviteSettings {
        ttl: chrono::Duration::days(config.invite_ttl_days),
        public_base_url: config.public_base_url.clone(),
        create_limit: config.create_rate_limit,
        create_window: config.create_rate_window,
    };
    let service = Arc::new(InviteService::new(
        invites,
        notifier,
        Arc::new(SlidingWindowLimiter::new()),
        Arc::new(SystemClock),
        settings,
    ));

    if config.expired_retention_days > 0 {
        spawn_lapsed_invite_sweep(
            service.clone(),
            chrono::Duration::days(config.expired_retention_days),
            config.sweep_interval,
        );
    }

    let state = AppState::new(service, JwtKeys::new(&config.jwt_secret), config.admin_ids.clone())
        .with_trusted_proxy_hops(config.trusted_proxy_hops);
    let app = create_router(state);

    info!("Server running on http://{}", config.bind_addr);

    let server = axum::Server::bind(&config.bind_addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        error!(error = %e, "server error");
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
