//! Error taxonomy for the lease/payment core (see spec §7).

use thiserror::Error;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors. Each variant is one of the error classes named in the
/// error-handling design: `ValidationError`, `NotFoundError`,
/// `InvalidTransitionError`, `ConflictError`, `ImmutableLedgerError`,
/// `GatewayError` / `PaymentExhaustedError`.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB).
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error (on-disk bincode representation).
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invalid input: non-positive principal, out-of-range term, etc.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lease state-machine guard violated.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Idempotency key in-flight with a different payload, or a
    /// concurrent writer collided on the same lease.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Attempted update or delete of a ledger entry. Programming error.
    #[error("ledger is append-only: {0}")]
    ImmutableLedger(String),

    /// Transient external gateway failure.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// A payment has exhausted its retry budget (three failed attempts).
    #[error("payment {0} exhausted retries")]
    PaymentExhausted(String),

    /// Concurrency error: lock contention, mailbox closed, etc.
    #[error("concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
