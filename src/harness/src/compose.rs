//! Docker Compose stack management and log capture.
//!
//! The stack is driven through `docker compose` in the compose directory:
//!
//! | operation      | command                                              |
//! |----------------|------------------------------------------------------|
//! | start          | `docker compose up -d`                               |
//! | stop           | `docker compose down`                                |
//! | verify         | `docker compose ps --services --filter status=running` |
//! | list services  | `docker compose config --services`                   |
//! | service logs   | `docker compose logs --no-color <service>`           |
//! | combined logs  | `docker compose logs --no-color`                     |

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::{HarnessError, Result};
use crate::paths::TestPaths;
use crate::process::{Invocation, ProcessOutput, ProcessRunner};

const DOCKER: &str = "docker";

/// Time given to the services after `up -d` before the first check.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Decides whether the harness starts and stops the stack itself.
///
/// The two variants come from two harnesses that made the same decision with
/// different switches and opposite defaults. Both are kept as-is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ManagementPolicy {
    /// Manage the stack only when `MANAGE_DOCKER=true`.
    #[default]
    OptIn,
    /// Manage the stack unless `SKIP_DOCKER_SETUP=true`.
    OptOut,
}

impl ManagementPolicy {
    pub fn env_var(self) -> &'static str {
        match self {
            ManagementPolicy::OptIn => "MANAGE_DOCKER",
            ManagementPolicy::OptOut => "SKIP_DOCKER_SETUP",
        }
    }

    /// Decision for a given value of [`Self::env_var`]. Only the exact
    /// string `true` counts as set.
    pub fn manages_stack(self, value: Option<&str>) -> bool {
        let set = value == Some("true");
        match self {
            ManagementPolicy::OptIn => set,
            ManagementPolicy::OptOut => !set,
        }
    }

    pub fn manages_stack_from_env(self) -> bool {
        self.manages_stack(std::env::var(self.env_var()).ok().as_deref())
    }

    /// Where this variant keeps its captured container logs.
    pub fn logs_dir(self, paths: &TestPaths) -> PathBuf {
        match self {
            ManagementPolicy::OptIn => paths.execution_logs_dir(),
            ManagementPolicy::OptOut => paths.compose_logs_dir(),
        }
    }
}

/// What [`ComposeStack::setup`] found or did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackStatus {
    /// `up -d` succeeded; the stack will be stopped on cleanup.
    Started,
    /// An existing deployment is used. Lists the running services; empty if
    /// none were found or the listing failed.
    Existing(Vec<String>),
}

/// Outcome of capturing one log file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    Saved(PathBuf),
    Failed(String),
}

impl CaptureOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            CaptureOutcome::Saved(path) => Some(path),
            CaptureOutcome::Failed(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCapture {
    pub service: String,
    pub outcome: CaptureOutcome,
}

/// Result of one log capture pass. Capture never fails as a whole; each
/// file succeeds or fails on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureReport {
    /// `YYYYMMDD_HHMMSS`, shared by every file of this pass
    pub timestamp: String,
    pub services: Vec<ServiceCapture>,
    /// `None` when the service listing failed and nothing was captured
    pub combined: Option<CaptureOutcome>,
    pub listing_error: Option<String>,
}

impl CaptureReport {
    pub fn saved_files(&self) -> Vec<&Path> {
        self.services
            .iter()
            .map(|capture| &capture.outcome)
            .chain(self.combined.iter())
            .filter_map(CaptureOutcome::path)
            .collect()
    }

    /// `(name, message)` for every failed capture; the combined log is
    /// reported as `combined`.
    pub fn failures(&self) -> Vec<(&str, &str)> {
        let services = self.services.iter().filter_map(|capture| match &capture.outcome {
            CaptureOutcome::Failed(message) => Some((capture.service.as_str(), message.as_str())),
            CaptureOutcome::Saved(_) => None,
        });
        let combined = match &self.combined {
            Some(CaptureOutcome::Failed(message)) => Some(("combined", message.as_str())),
            _ => None,
        };
        services.chain(combined).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.listing_error.is_none() && self.failures().is_empty()
    }
}

/// A docker compose deployment driven from the compose directory.
pub struct ComposeStack {
    runner: Arc<dyn ProcessRunner>,
    compose_dir: PathBuf,
    logs_dir: PathBuf,
    manage: bool,
    settle_delay: Duration,
    started: bool,
}

impl ComposeStack {
    /// Creates the manager and the logs directory.
    ///
    /// `manage` decides whether [`Self::setup`] starts the stack or only
    /// verifies an existing one.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        compose_dir: impl Into<PathBuf>,
        logs_dir: impl Into<PathBuf>,
        manage: bool,
    ) -> Result<Self> {
        let logs_dir = logs_dir.into();
        std::fs::create_dir_all(&logs_dir).map_err(|source| HarnessError::Io {
            path: logs_dir.clone(),
            source,
        })?;

        Ok(Self {
            runner,
            compose_dir: compose_dir.into(),
            logs_dir,
            manage,
            settle_delay: DEFAULT_SETTLE_DELAY,
            started: false,
        })
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Whether this instance started the stack and will stop it.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Starts the stack or verifies an existing one.
    ///
    /// A failed start is returned as [`HarnessError::StackStartup`]; a failed
    /// verification is only logged.
    pub async fn setup(&mut self) -> Result<StackStatus> {
        if self.manage {
            log::info!("Starting Docker Compose services...");
            self.start().await?;
            Ok(StackStatus::Started)
        } else {
            log::info!("Using existing setup.");
            let running = match self.running_services().await {
                Ok(running) => running,
                Err(e) => {
                    log::warn!("Failed to verify services: {e}");
                    Vec::new()
                }
            };
            if running.is_empty() {
                log::warn!("No running Docker Compose services found");
            } else {
                log::info!("Found running services: {}", running.join(", "));
            }
            Ok(StackStatus::Existing(running))
        }
    }

    /// Runs `up -d`, waits for the settle delay and marks the stack as ours.
    pub async fn start(&mut self) -> Result<()> {
        let output = self.compose(&["up", "-d"]).await;
        match output {
            Ok(_) => {
                log::info!("Docker Compose started successfully");
                tokio::time::sleep(self.settle_delay).await;
                self.started = true;
                Ok(())
            }
            Err(HarnessError::Compose {
                command,
                code,
                stdout,
                stderr,
            }) => Err(HarnessError::StackStartup {
                command,
                code,
                stdout,
                stderr,
            }),
            Err(e) => Err(e),
        }
    }

    /// Runs `down`. The stack still counts as started if it fails.
    pub async fn stop(&mut self) -> Result<()> {
        self.compose(&["down"]).await?;
        log::info!("Docker Compose stopped successfully");
        self.started = false;
        Ok(())
    }

    pub async fn running_services(&self) -> Result<Vec<String>> {
        let output = self
            .compose(&["ps", "--services", "--filter", "status=running"])
            .await?;
        Ok(output.stdout_lines())
    }

    /// Captures logs, then stops the stack if this instance started it.
    pub async fn cleanup(&mut self) -> CaptureReport {
        let report = self.capture_logs().await;
        if self.started {
            log::info!("Stopping Docker Compose services...");
            if let Err(e) = self.stop().await {
                log::error!("Failed to stop Docker Compose: {e}");
            }
        }
        report
    }

    pub async fn capture_logs(&self) -> CaptureReport {
        self.capture_logs_at(Local::now()).await
    }

    /// Writes `<service>_<ts>.log` for every configured service and
    /// `combined_<ts>.log`, each behind a banner with the capture time.
    pub async fn capture_logs_at(&self, at: DateTime<Local>) -> CaptureReport {
        log::info!("Capturing container logs...");
        let timestamp = at.format("%Y%m%d_%H%M%S").to_string();
        let captured_at = at.format("%Y-%m-%d %H:%M:%S").to_string();
        let mut report = CaptureReport {
            timestamp: timestamp.clone(),
            services: Vec::new(),
            combined: None,
            listing_error: None,
        };

        let services = match self.compose(&["config", "--services"]).await {
            Ok(output) => output.stdout_lines(),
            Err(e) => {
                log::error!("Failed to get service list: {e}");
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        for service in services {
            let banner = format!("=== Logs for service: {service} ===");
            let outcome = self
                .capture_one(
                    &["logs", "--no-color", service.as_str()],
                    &format!("{service}_{timestamp}.log"),
                    &banner,
                    &captured_at,
                )
                .await;
            match &outcome {
                CaptureOutcome::Saved(path) => {
                    log::info!("Saved logs for {service} to {}", path.display())
                }
                CaptureOutcome::Failed(message) => {
                    log::warn!("Failed to capture logs for service {service}: {message}")
                }
            }
            report.services.push(ServiceCapture { service, outcome });
        }

        let combined = self
            .capture_one(
                &["logs", "--no-color"],
                &format!("combined_{timestamp}.log"),
                "=== Combined Docker Compose Logs ===",
                &captured_at,
            )
            .await;
        match &combined {
            CaptureOutcome::Saved(path) => {
                log::info!("Saved combined logs to {}", path.display())
            }
            CaptureOutcome::Failed(message) => {
                log::warn!("Failed to capture combined logs: {message}")
            }
        }
        report.combined = Some(combined);
        report
    }

    async fn capture_one(
        &self,
        args: &[&str],
        file_name: &str,
        banner: &str,
        captured_at: &str,
    ) -> CaptureOutcome {
        let output = match self.compose(args).await {
            Ok(output) => output,
            Err(e) => return CaptureOutcome::Failed(e.to_string()),
        };

        let path = self.logs_dir.join(file_name);
        let contents = format!(
            "{banner}\n=== Captured at: {captured_at} ===\n\n{}",
            output.stdout
        );
        match tokio::fs::write(&path, contents).await {
            Ok(()) => CaptureOutcome::Saved(path),
            Err(e) => CaptureOutcome::Failed(format!("{}: {e}", path.display())),
        }
    }

    /// Runs `docker compose <args>` in the compose directory. A non-zero exit
    /// is an error.
    async fn compose(&self, args: &[&str]) -> Result<ProcessOutput> {
        let invocation = Invocation::new(
            DOCKER,
            std::iter::once("compose").chain(args.iter().copied()),
        )
        .in_dir(&self.compose_dir);

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| HarnessError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        if output.success() {
            Ok(output)
        } else {
            Err(HarnessError::Compose {
                command: invocation.to_string(),
                code: output.exit_code(),
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}
