//! Infrastructure: configuration, logging, HTTP
//!
//! Ambient concerns shared by the step engine and the tool modules.

pub mod config;
pub mod http;
pub mod logging;

pub use config::Config;
pub use http::{FetchError, HttpFetcher};
pub use logging::init_logging;
