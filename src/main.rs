//! stepline - CLI tools for the container step engine
//!
//! A thin command-line surface over the stepline library for the
//! operations that are useful outside a pipeline definition.
//!
//! ## Commands
//!
//! - `stepline render` - Render templates against a variable map
//! - `stepline copy` - Copy an image between registries
//! - `stepline doctor` - Check host runtime health
//! - `stepline completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Render templates with a variable file and an inline override
//! stepline render app.conf.tmpl -v vars.yaml --set env=prod -o out/
//!
//! # Mirror an image between registries
//! stepline copy docker.io/library/alpine:3.20 registry.example.com/mirror/alpine:3.20
//!
//! # Check which container runtimes are available
//! stepline doctor
//!
//! # Generate shell completions
//! stepline completions bash > /etc/bash_completion.d/stepline
//! ```

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    // Initialize tracing for debugging
    if std::env::var("STEPLINE_DEBUG").is_ok() {
        stepline::infrastructure::init_logging("debug");
    }

    // Run the CLI
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if std::env::var("STEPLINE_VERBOSE").is_ok() {
                eprintln!("{:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}
