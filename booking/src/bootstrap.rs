//! Process startup: connect, migrate, reconcile, wire the environment.

use crate::config::{Config, PostgresConfig};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::service::BookingEnvironment;
use boxoffice_core::BookingError;
use boxoffice_core::environment::{Clock, SystemClock};
use boxoffice_postgres::{
    IndexReconciliation, PostgresBookingStore, PostgresOwnerDirectory, PostgresPaymentRecordStore,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Fatal startup failures.
///
/// Index reconciliation is deliberately absent: it never aborts startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// `PostgreSQL` stayed unreachable after every retry
    #[error("Failed to connect to PostgreSQL: {0}")]
    Connect(#[source] sqlx::Error),
    /// Schema migrations failed
    #[error("Failed to migrate database: {0}")]
    Migrate(#[source] BookingError),
}

/// A wired environment plus what startup did to the schema.
pub struct Bootstrapped {
    /// Environment backed by `PostgreSQL`
    pub environment: BookingEnvironment,
    /// Booking store, for maintenance calls outside the service
    pub bookings: Arc<PostgresBookingStore>,
    /// Reconciliation outcome, `None` if disabled
    pub reconciliation: Option<IndexReconciliation>,
}

/// Open a connection pool, retrying while the database is unreachable.
///
/// # Errors
///
/// Returns [`BootstrapError::Connect`] once `connect_retries` retries have failed.
#[tracing::instrument(skip(config), fields(max_connections = config.max_connections))]
pub async fn connect_pool(config: &PostgresConfig) -> Result<PgPool, BootstrapError> {
    let policy = RetryPolicy::builder()
        .max_retries(config.connect_retries)
        .initial_delay(Duration::from_millis(250))
        .max_delay(Duration::from_secs(5))
        .build();

    retry_with_backoff(policy, || {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout)))
            .connect(&config.url)
    })
    .await
    .map_err(BootstrapError::Connect)
}

/// Connect, migrate and, if enabled, reconcile the payment reference index.
///
/// # Errors
///
/// - [`BootstrapError::Connect`] if the database stays unreachable
/// - [`BootstrapError::Migrate`] if migrations fail
pub async fn bootstrap(config: &Config) -> Result<Bootstrapped, BootstrapError> {
    let pool = connect_pool(&config.postgres).await?;
    tracing::info!("Connected to PostgreSQL");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let bookings = Arc::new(PostgresBookingStore::with_clock(pool.clone(), Arc::clone(&clock)));
    bookings.migrate().await.map_err(BootstrapError::Migrate)?;
    tracing::info!("Migrations applied");

    let reconciliation = if config.reconcile_indexes {
        let outcome = bookings.reconcile_payment_reference_index().await;
        if matches!(outcome, IndexReconciliation::Failed { .. }) {
            tracing::warn!(%outcome, "Continuing without a verified payment reference index");
        }
        Some(outcome)
    } else {
        tracing::info!("Payment reference index reconciliation disabled");
        None
    };

    let environment = BookingEnvironment::new(
        Arc::clone(&clock),
        bookings.clone(),
        Arc::new(PostgresPaymentRecordStore::with_clock(pool.clone(), clock)),
        Arc::new(PostgresOwnerDirectory::new(pool)),
    );

    Ok(Bootstrapped {
        environment,
        bookings,
        reconciliation,
    })
}
