use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::compose::ManagementPolicy;

/// Arguments shared by every subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(
        long,
        env = "TEST_PROFILE",
        help = "Profile from test_profiles.toml (default: docker)"
    )]
    pub profile: Option<String>,

    #[arg(long, help = "Directory holding test_profiles.toml and the ice config")]
    pub tests_dir: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = PolicyArg::OptIn,
        help = "Which environment variable decides whether the stack is started"
    )]
    pub policy: PolicyArg,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Start the stack only when MANAGE_DOCKER=true
    OptIn,
    /// Start the stack unless SKIP_DOCKER_SETUP=true
    OptOut,
}

impl From<PolicyArg> for ManagementPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::OptIn => ManagementPolicy::OptIn,
            PolicyArg::OptOut => ManagementPolicy::OptOut,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the stack checks (default)
    Run {
        #[arg(long = "case", help = "Only run checks whose name contains this")]
        cases: Vec<String>,
    },
    /// Start the compose stack
    Up,
    /// Stop the compose stack
    Down,
    /// List running compose services
    Status,
    /// Capture container logs
    Logs,
    /// Show the resolved profile and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Self::Run { cases: Vec::new() }
    }
}

pub mod utils {
    use anyhow::{Context, Result};
    use tracing_subscriber::EnvFilter;

    use super::CommonArgs;
    use crate::compose::{CaptureOutcome, CaptureReport};
    use crate::context::HarnessContext;
    use crate::suite::{CaseStatus, SuiteReport};

    /// Initialize logging based on CLI arguments. `RUST_LOG` wins when set.
    pub fn init_logging(args: &CommonArgs) {
        let level = if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    /// Display the resolved profile in human-readable or JSON format
    pub fn display_config(ctx: &HarnessContext, json: bool) -> Result<()> {
        let config = &ctx.config;
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
            return Ok(());
        }

        println!("Antalya Test Profile: {}", ctx.profile);
        println!("=========================");
        println!("Tests directory: {}", ctx.paths.tests_dir.display());
        println!("ClickHouse: {}:{} (http {})", config.ch_host, config.ch_port, config.ch_http_port);
        println!("ClickHouse user: {}", config.ch_user);
        println!("Ice REST catalog: {}", config.catalog_base_url());
        println!("Ice config: {}", config.ice_config);
        println!("Catalog endpoint: {}", config.ice_catalog_endpoint);
        for (name, value) in [
            ("auth_header", &config.ice_setting_auth_header),
            ("warehouse", &config.ice_setting_warehouse),
            ("storage_endpoint", &config.ice_setting_storage_endpoint),
        ] {
            if !value.is_empty() {
                println!("Catalog {name}: {value}");
            }
        }
        println!("Use docker: {}", config.use_docker);
        Ok(())
    }

    pub fn print_capture(report: &CaptureReport) {
        for file in report.saved_files() {
            println!("saved {}", file.display());
        }
        for (service, message) in report.failures() {
            println!("failed {service}: {message}");
        }
        if let Some(error) = &report.listing_error {
            println!("could not list services: {error}");
        }
    }

    pub fn print_report(report: &SuiteReport) {
        for outcome in &report.outcomes {
            match &outcome.status {
                CaseStatus::Passed => {
                    println!("test {} ... ok ({:.1?})", outcome.name, outcome.elapsed)
                }
                CaseStatus::Skipped(reason) => {
                    println!("test {} ... skipped: {reason}", outcome.name)
                }
                CaseStatus::Failed(message) => {
                    println!("test {} ... FAILED\n    {message}", outcome.name)
                }
            }
        }
        if let Some(capture) = &report.capture {
            let saved = capture
                .services
                .iter()
                .filter(|service| matches!(service.outcome, CaptureOutcome::Saved(_)))
                .count();
            println!("captured logs for {saved}/{} services", capture.services.len());
        }
        println!();
        println!("{}", report.summary());
    }
}
