//! CLI tools for stepline
//!
//! Utility surface around the step engine:
//! - `render`: Render templates against a variable map
//! - `copy`: Copy an image between registries
//! - `doctor`: Check host runtime health
//! - `completions`: Generate shell completions

pub mod completions;
pub mod copy;
pub mod doctor;
pub mod render;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for stepline
#[derive(Parser, Debug)]
#[command(name = "stepline")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render template files or URLs against a variable map
    Render {
        /// Template files or http(s) URLs
        #[arg(required = true)]
        templates: Vec<String>,
        /// YAML variable file
        #[arg(short, long)]
        vars: Option<PathBuf>,
        /// Inline override (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
        /// Fail on missing keys instead of substituting the sentinel
        #[arg(long)]
        strict: bool,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Copy an image between registries
    Copy {
        /// Source image reference
        source: String,
        /// Target image reference
        target: String,
        /// Copy platform
        #[arg(long)]
        platform: Option<String>,
        /// Source registry username
        #[arg(long)]
        source_user: Option<String>,
        /// Env var holding the source registry password
        #[arg(long, value_name = "VAR")]
        source_password_env: Option<String>,
        /// Target registry username
        #[arg(long)]
        target_user: Option<String>,
        /// Env var holding the target registry password
        #[arg(long, value_name = "VAR")]
        target_password_env: Option<String>,
        /// Host runtime to execute with (defaults to the configured runtime)
        #[arg(long, value_enum)]
        runtime: Option<RuntimeArg>,
    },

    /// Check host runtime health
    Doctor {
        /// Check only this runtime
        #[arg(long, value_enum)]
        runtime: Option<RuntimeArg>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RuntimeArg {
    Docker,
    Podman,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    Args::command()
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Render {
            templates,
            vars,
            set,
            strict,
            output,
        } => {
            render::run(&render::RenderArgs {
                templates,
                vars,
                set,
                strict,
                output,
            })?;
        }
        Command::Copy {
            source,
            target,
            platform,
            source_user,
            source_password_env,
            target_user,
            target_password_env,
            runtime,
        } => {
            copy::run(&copy::CopyArgs {
                source,
                target,
                platform,
                source_user,
                source_password_env,
                target_user,
                target_password_env,
                runtime,
            })?;
        }
        Command::Doctor { runtime } => {
            doctor::run(runtime)?;
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{}", completions);
            }
        }
    }

    Ok(())
}
