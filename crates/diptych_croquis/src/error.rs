//! Error types for resolution.

/// Error type for resolver operations.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A configured library could not be resolved at initialization.
    #[error("could not resolve \"{lib_name}\"")]
    UnresolvableLibrary { lib_name: String },
}

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
