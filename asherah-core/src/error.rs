use thiserror::Error;

/// Result type for asherah operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the asherah library.
///
/// The variants mirror the failure modes of the envelope-encryption engine
/// itself (key resolution, caching, Metastore/KMS interaction) rather than
/// being a generic grab-bag; callers can match on these to decide what is
/// recoverable.
#[derive(Error, Debug)]
pub enum Error {
    /// A secure-memory resource limit (e.g. RLIMIT_MEMLOCK) would be exceeded.
    #[error("resource limit: {0}")]
    ResourceLimit(String),

    /// Reading from the Metastore failed.
    #[error("metastore read failed: {0}")]
    MetastoreRead(String),

    /// Writing to the Metastore failed (not a duplicate-key conflict).
    #[error("metastore write failed: {0}")]
    MetastoreWrite(String),

    /// A write raced another writer for the same `(id, created)` pair.
    /// Recovered internally by re-reading the winner's record; only escapes
    /// to a caller if the retry itself fails.
    #[error("duplicate key write: {0}")]
    DuplicateKey(String),

    /// The KMS failed to wrap a key.
    #[error("kms encrypt failed: {0}")]
    KmsEncrypt(String),

    /// The KMS failed to unwrap a key (including after trying all regions).
    #[error("kms decrypt failed: {0}")]
    KmsDecrypt(String),

    /// No system key could be resolved for the requested id.
    #[error("missing system key: {0}")]
    MissingSK(String),

    /// No intermediate key could be resolved for the requested id.
    #[error("missing intermediate key: {0}")]
    MissingIK(String),

    /// The parent key id referenced by a record does not belong to this
    /// partition.
    #[error("record belongs to a different partition: {0}")]
    BadPartition(String),

    /// An AEAD tag failed to verify, or decoded material otherwise failed
    /// an integrity check.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A record failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// The session has already been closed.
    #[error("session is closed")]
    ClosedSession,

    /// Errors related to secure memory operations
    #[error("secure memory error: {0}")]
    SecureMemory(#[from] securememory::SecureMemoryError),

    /// Errors related to JSON serialization/deserialization
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid argument passed to a builder or constructor.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// General internal/programming-error condition (lock poisoning, an
    /// invariant the caches are supposed to maintain having been violated).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Internal(err.to_string())
    }
}
