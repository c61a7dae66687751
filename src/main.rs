use anyhow::{Context, Result};
use clap::Parser;
use harness::cli::{Command, CommonArgs, utils};
use harness::suite::{self, RunOptions, cases};
use harness::{HarnessContext, StackStatus, TestPaths};

#[derive(Parser)]
#[command(name = "antalya-harness")]
#[command(about = "Integration checks for the Antalya stack (ice REST catalog, ClickHouse, swarm)")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::init_logging(&cli.common);

    let tests_dir = cli
        .common
        .tests_dir
        .clone()
        .unwrap_or_else(|| TestPaths::from_manifest_dir(env!("CARGO_MANIFEST_DIR")).tests_dir);
    let ctx = HarnessContext::load(
        &tests_dir,
        cli.common.profile.as_deref(),
        cli.common.policy.into(),
    )
    .context("Failed to load test profile")?;
    log::info!("Using test profile: {}", ctx.profile);

    match cli.command.unwrap_or_default() {
        Command::Config { json } => utils::display_config(&ctx, json)?,
        Command::Run { cases: filters } => {
            let analytics = ctx
                .analytics_client()
                .context("Failed to configure ClickHouse client")?;
            let report = suite::run(ctx, analytics, &cases::all(), &RunOptions { filters })
                .await
                .context("Stack setup failed")?;
            utils::print_report(&report);
            if !report.is_success() {
                std::process::exit(1);
            }
        }
        Command::Up => {
            let mut stack = ctx.compose_stack_managed(true)?;
            stack.start().await.context("Failed to start Docker Compose")?;
        }
        Command::Down => {
            let mut stack = ctx.compose_stack_managed(true)?;
            stack.stop().await.context("Failed to stop Docker Compose")?;
        }
        Command::Status => {
            let mut stack = ctx.compose_stack_managed(false)?;
            if let StackStatus::Existing(running) = stack.setup().await? {
                for service in running {
                    println!("{service}");
                }
            }
        }
        Command::Logs => {
            let stack = ctx.compose_stack_managed(false)?;
            let report = stack.capture_logs().await;
            utils::print_capture(&report);
        }
    }

    Ok(())
}
