use sea_orm::error::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the ledger and registry services.
///
/// Every validation failure is detected before any mutation and carries
/// enough context (identifiers, requested vs. available quantities, warehouse
/// names) for the caller to build an actionable message without re-querying.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Item {serial_number} already placed in warehouse '{warehouse}'")]
    AlreadyPlaced {
        serial_number: String,
        warehouse: String,
    },

    #[error("Warehouse '{warehouse}' has insufficient capacity. Available: {available}, Requested: {requested}")]
    CapacityExceeded {
        warehouse: String,
        available: i32,
        requested: i32,
    },

    #[error("Insufficient quantity at source. Available: {available}, Requested: {requested}")]
    InsufficientQuantity { available: i32, requested: i32 },

    #[error("Item with serial number {0} already exists")]
    DuplicateSerial(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A guarded update or delete matched zero rows because another
    /// transaction changed the row first. Always retried; callers only see
    /// it when the retry budget is exhausted.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Unable to allocate a unique serial number after {attempts} attempts")]
    SerialAllocationExhausted { attempts: u32 },

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Helper to wrap anything displayable as a database error.
    pub fn db_error(err: impl std::fmt::Display) -> Self {
        ServiceError::DatabaseError(DbErr::Custom(err.to_string()))
    }

    pub fn not_found(entity: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} not found with id: {}", entity, id))
    }

    /// Whether the error is a store-level conflict worth retrying inside a
    /// fresh transaction (lock contention, serialization failure, or a
    /// guarded write that lost its race). Caller errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::ConcurrentModification(_) => true,
            ServiceError::DatabaseError(db_err) => {
                let msg = db_err.to_string();
                msg.contains("database is locked")
                    || msg.contains("deadlock")
                    || msg.contains("could not serialize access")
                    || msg.contains("serialization failure")
            }
            _ => false,
        }
    }
}

/// Detects a unique-constraint violation from the backend error message.
///
/// SQLite reports "UNIQUE constraint failed", Postgres "duplicate key value
/// violates unique constraint". Used to map races on the placement pair and
/// serial number indexes onto their domain errors.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("UNIQUE constraint failed") || msg.contains("duplicate key value")
}
