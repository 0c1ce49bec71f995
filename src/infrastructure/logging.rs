//! Logging configuration
//!
//! Initializes tracing for the application. Secret values are never logged;
//! only secret identifiers and env var names may appear in fields.

/// Initializes logging with the specified level
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Execution is sequential; thread ids would be noise.
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true)
        .init();
}
