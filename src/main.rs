use std::{process, sync::Arc};

use medrecords::{
    application::{
        auth::{AuthService, passwords::PasswordHasher, tokens::TokenCodec},
        error::AppError,
        jobs::{MetricsRefreshContext, spawn_metrics_refresh},
        repos::{EntityRepo, StatisticsRepo, UsersRepo},
        service::{CrudService, EntityService},
        statistics::StatisticsService,
        users::UserService,
    },
    cache::{CacheConfig, ResponseCache},
    config,
    domain::entities::{DocumentRecord, PatientRecord, RoleRecord},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
    },
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tokio::{net::TcpListener, sync::Notify, task::JoinHandle};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    let repositories = Arc::new(PostgresRepositories::new(pool));

    let metrics = if settings.metrics.enabled {
        Some(telemetry::install_prometheus().map_err(AppError::from)?)
    } else {
        None
    };

    let state = build_app_state(repositories.clone(), &settings, metrics).await?;

    let refresh_job = settings.metrics.enabled.then(|| {
        let repo: Arc<dyn StatisticsRepo> = repositories.clone();
        spawn_metrics_refresh(
            MetricsRefreshContext::new(repo),
            settings.metrics.refresh_interval,
        )
    });

    let result = serve_http(&settings, state).await;

    if let Some(handle) = refresh_job {
        handle.abort();
    }
    result
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = init_pool(&settings).await?;
    pool.close().await;
    info!(target = "medrecords::migrate", "database schema is up to date");
    Ok(())
}

/// Connects the pool and brings the schema up to date.
async fn init_pool(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings.database.url.as_deref().ok_or_else(|| {
        AppError::from(InfraError::configuration("database url is not configured"))
    })?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(pool)
}

async fn build_app_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
    metrics: Option<PrometheusHandle>,
) -> Result<AppState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let roles_repo: Arc<dyn EntityRepo<RoleRecord>> = repositories.clone();
    let patients_repo: Arc<dyn EntityRepo<PatientRecord>> = repositories.clone();
    let documents_repo: Arc<dyn EntityRepo<DocumentRecord>> = repositories.clone();
    let statistics_repo: Arc<dyn StatisticsRepo> = repositories;

    let hasher = PasswordHasher::new(settings.auth.password_hash_cost);
    let users = Arc::new(UserService::new(users_repo, hasher));
    let roles: Arc<dyn CrudService<RoleRecord>> = Arc::new(EntityService::new(roles_repo));
    let patients: Arc<dyn CrudService<PatientRecord>> =
        Arc::new(EntityService::new(patients_repo));
    let documents: Arc<dyn CrudService<DocumentRecord>> =
        Arc::new(EntityService::new(documents_repo));

    let tokens = TokenCodec::from_settings(&settings.auth)
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
    let auth = Arc::new(AuthService::new(
        users.clone(),
        roles.clone(),
        Arc::new(tokens),
    ));

    let upload_limit_bytes = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| {
            AppError::from(InfraError::configuration(
                "uploads.max_request_bytes does not fit in memory",
            ))
        })?;

    Ok(AppState {
        users,
        roles,
        patients,
        documents,
        auth,
        statistics: Arc::new(StatisticsService::new(statistics_repo)),
        cache: init_cache(&settings.cache).await,
        metrics,
        upload_limit_bytes,
        api_prefix: settings.server.api_prefix.clone(),
    })
}

/// Falls back to the in-process store when Redis is unreachable at startup.
async fn init_cache(settings: &config::CacheSettings) -> ResponseCache {
    let cache_config = CacheConfig::from(settings);
    match ResponseCache::connect(cache_config.clone(), settings.redis_url.as_deref()).await {
        Ok(cache) => cache,
        Err(err) => {
            warn!(
                target = "medrecords::cache",
                error = %err,
                "redis unavailable, using in-memory response cache"
            );
            ResponseCache::in_memory(cache_config)
        }
    }
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "medrecords::http",
        addr = %settings.server.addr,
        api_prefix = %settings.server.api_prefix,
        "listening"
    );

    let router = http::build_router(state);
    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();

    let mut server: JoinHandle<std::io::Result<()>> = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { trigger.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        _ = shutdown_signal() => {}
    }

    info!(target = "medrecords::http", "shutdown requested, draining connections");
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "medrecords::http",
                grace_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("http server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
