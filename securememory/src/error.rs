use thiserror::Error;

/// Errors that can occur in the securememory library.
///
/// This enum represents all possible error conditions that can occur when using
/// the securememory library. Each variant includes a description of what went
/// wrong and, where appropriate, additional context information.
///
/// # Examples
///
/// ```rust,no_run
/// use securememory::Result;
/// use securememory::secret::{Secret, SecretFactory};
/// use securememory::protected_memory::DefaultSecretFactory;
///
/// fn process_secret() -> Result<()> {
///     let factory = DefaultSecretFactory::new();
///     
///     // This will result in an OperationFailed error
///     let empty_vec = Vec::<u8>::new();
///     let result = factory.new(&mut empty_vec.clone());
///     
///     if let Err(e) = result {
///         println!("Error creating secret: {}", e);
///         // Handle the error appropriately
///     }
///     
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum SecureMemoryError {
    /// The process's memlock (RLIMIT_MEMLOCK) budget would be exceeded by this
    /// allocation. Checked before any syscall is made, so no partial secret is
    /// left behind.
    #[error("memlock resource limit reached: {0}")]
    ResourceLimit(String),

    /// Allocation of the backing buffer failed (mmap, aligned alloc, etc).
    #[error("failed to allocate secure memory: {0}")]
    Alloc(String),

    /// A platform call failed: mlock/munlock, mprotect, madvise, or any other
    /// OS-level operation on the secret's memory.
    #[error("platform memory operation failed: {0}")]
    Platform(String),

    /// The system RNG failed to produce random bytes.
    #[error("entropy source failed: {0}")]
    Entropy(String),

    /// The secret has already been closed; it cannot be accessed again.
    #[error("secret is closed")]
    ClosedSecret,

    /// Memory corruption or buffer overflow detected (e.g. a guard-page
    /// canary no longer matches).
    #[error("memory integrity check failed: {0}")]
    Integrity(String),
}

impl From<memguard::MemguardError> for SecureMemoryError {
    fn from(err: memguard::MemguardError) -> Self {
        use memguard::MemguardError;
        match err {
            MemguardError::SecretClosed => SecureMemoryError::ClosedSecret,
            MemguardError::ProtectionFailed(msg) => SecureMemoryError::Platform(msg),
            MemguardError::MemoryLockFailed(msg) => SecureMemoryError::Platform(msg),
            MemguardError::MemoryUnlockFailed(msg) => SecureMemoryError::Platform(msg),
            MemguardError::OperationFailed(msg) => SecureMemoryError::Platform(msg),
            MemguardError::MemcallError(e) => SecureMemoryError::Platform(e.to_string()),
            MemguardError::CryptoError(msg) => SecureMemoryError::Platform(format!("Crypto error: {}", msg)),
            MemguardError::OsError(msg) => SecureMemoryError::Platform(msg),
            MemguardError::IoError(e) => SecureMemoryError::Platform(e.to_string()),
            MemguardError::MemoryCorruption(msg) => SecureMemoryError::Integrity(msg),
        }
    }
}

/// Result type for securememory operations.
///
/// This type alias is used throughout the library to represent operation results
/// that may fail with a `SecureMemoryError`.
///
/// # Examples
///
/// ```rust,no_run
/// use securememory::Result;
/// use securememory::secret::{Secret, SecretFactory, SecretExtensions};
/// use securememory::protected_memory::DefaultSecretFactory;
///
/// fn use_secret() -> Result<String> {
///     let factory = DefaultSecretFactory::new();
///     let mut data = b"sensitive-data".to_vec();
///     let secret = factory.new(&mut data)?;
///     
///     secret.with_bytes_func(|bytes| {
///         let result = String::from_utf8_lossy(bytes).to_string();
///         Ok((result, Vec::new()))
///     })
/// }
/// ```
pub type Result<T> = std::result::Result<T, SecureMemoryError>;