pub mod auth;
pub mod error;

/// Helper type used as a return type for HTTP and WS handlers.
/// This type helps aggregating multiple error types from this crate as well as different
/// external crates which have an error system.
pub type Result<T> = std::result::Result<T, error::ServerError>;

/// Reads an environment variable, falling back to `default` when unset.
pub fn get_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
