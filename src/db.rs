use crate::config::AppConfig;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionError,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Maximum attempts for conflict-retried transactions
const MAX_TXN_ATTEMPTS: u32 = 5;
/// Base backoff between retries; doubles per attempt
const BASE_BACKOFF_MS: u64 = 20;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!("Database connection pool established successfully");

    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// Convenience helper to create a DB pool using loaded AppConfig
pub async fn create_db_pool() -> Result<DbPool, ServiceError> {
    let cfg = crate::config::load_config()
        .map_err(|e| ServiceError::InternalError(format!("Failed to load config: {}", e)))?;
    establish_connection_from_app_config(&cfg).await
}

/// Runs database migrations using the embedded migrator
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = std::time::Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::DatabaseError);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Runs a closure inside a transaction, retrying bounded times with
/// exponential backoff when the store reports a conflict (locked database,
/// deadlock, serialization failure). Domain errors are returned unchanged on
/// the first occurrence; retries are invisible to the caller.
pub async fn transaction_with_retry<F, T>(db: &DbPool, f: F) -> Result<T, ServiceError>
where
    F: for<'c> Fn(&'c DatabaseTransaction) -> BoxFuture<'c, Result<T, ServiceError>> + Send + Sync,
    T: Send + 'static,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let result = db.transaction::<_, T, ServiceError>(|txn| f(txn)).await;

        let err = match result {
            Ok(value) => return Ok(value),
            Err(TransactionError::Connection(e)) => ServiceError::DatabaseError(e),
            Err(TransactionError::Transaction(e)) => e,
        };

        if attempt < MAX_TXN_ATTEMPTS && err.is_retryable() {
            let backoff = Duration::from_millis(BASE_BACKOFF_MS << (attempt - 1).min(6));
            warn!(
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying transaction after store conflict: {}",
                err
            );
            tokio::time::sleep(backoff).await;
            continue;
        }

        return Err(err);
    }
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    debug!("Checking database connection");
    pool.ping().await.map_err(|e| {
        error!("Database connection check failed: {}", e);
        ServiceError::DatabaseError(e)
    })
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");

    pool.close().await.map_err(ServiceError::DatabaseError)
}
