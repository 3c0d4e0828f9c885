use rusty_library_circulation::{
    adapters::postgres::{
        PostgresCatalogStore, PostgresEventStore, PostgresLoanRepository,
        PostgresMembershipStore, PostgresPaymentRepository, PostgresReservationRepository,
        PostgresUnitOfWork,
    },
    api::{AppState, create_router},
    application::circulation::{
        CirculationLocks, ServiceDependencies, expire_reservations, sweep_overdue,
    },
    config::AppConfig,
};
use std::{sync::Arc, time::Duration};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rusty_library_circulation=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!(
        port = config.port,
        max_connections = config.database_max_connections,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "starting circulation service"
    );

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize adapters
    let service_deps = ServiceDependencies {
        catalog: Arc::new(PostgresCatalogStore::new(pool.clone())),
        membership: Arc::new(PostgresMembershipStore::new(pool.clone())),
        loans: Arc::new(PostgresLoanRepository::new(pool.clone())),
        reservations: Arc::new(PostgresReservationRepository::new(pool.clone())),
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        unit_of_work: Arc::new(PostgresUnitOfWork::new(pool)),
        policy: config.policy.clone(),
        locks: Arc::new(CirculationLocks::default()),
    };

    if !config.sweep_interval.is_zero() {
        tokio::spawn(run_sweeps(service_deps.clone(), config.sweep_interval));
    }

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodic overdue reclassification and reservation expiry.
async fn run_sweeps(deps: ServiceDependencies, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let now = chrono::Utc::now();

        if let Err(e) = sweep_overdue(&deps, now).await {
            tracing::error!(error = %e, "overdue sweep failed");
        }
        if let Err(e) = expire_reservations(&deps, now).await {
            tracing::error!(error = %e, "reservation expiry sweep failed");
        }
    }
}
