//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Only construction-time
//! failures surface as errors; lock contention resolves to sentinel values.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// An item could not be built from the supplied key, value or policy
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The background purge thread could not be started
    #[error("Purge timer error: {0}")]
    Timer(#[from] std::io::Error),

    /// A blocking cache call failed inside the async runtime
    #[error("Runtime error: {0}")]
    Runtime(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
