//! Sequential runner for the stack checks.
//!
//! A run sets up the compose stack (when the profile uses docker), runs each
//! selected check in order, then captures logs and tears the stack down. A
//! failing check is recorded and the run continues; only a failed stack
//! start aborts the run.

pub mod cases;

use std::fmt;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use crate::analytics::AnalyticsClient;
use crate::compose::{CaptureReport, StackStatus};
use crate::context::HarnessContext;
use crate::error::Result;
use crate::os::OsHelper;

/// Components available to every check.
pub struct Suite {
    pub ctx: HarnessContext,
    pub os: OsHelper,
    pub analytics: AnalyticsClient,
}

/// Successful end of a check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Skipped(String),
}

pub type CaseFn = for<'a> fn(&'a Suite) -> BoxFuture<'a, Result<Verdict>>;

#[derive(Clone, Copy)]
pub struct StackCase {
    pub name: &'static str,
    pub description: &'static str,
    pub run: CaseFn,
}

impl fmt::Debug for StackCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackCase").field("name", &self.name).finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    Skipped(String),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct CaseOutcome {
    pub name: &'static str,
    pub status: CaseStatus,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Run only checks whose name contains one of these; empty runs all.
    pub filters: Vec<String>,
}

impl RunOptions {
    pub fn selects(&self, name: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| name.contains(filter.as_str()))
    }
}

#[derive(Clone, Debug)]
pub struct SuiteReport {
    pub profile: String,
    /// `None` when the profile does not use docker
    pub stack: Option<StackStatus>,
    pub outcomes: Vec<CaseOutcome>,
    pub capture: Option<CaptureReport>,
}

impl SuiteReport {
    pub fn failed(&self) -> Vec<&CaseOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, CaseStatus::Failed(_)))
            .collect()
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == CaseStatus::Passed)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, CaseStatus::Skipped(_)))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "profile {}: {} passed, {} failed, {} skipped",
            self.profile,
            self.passed_count(),
            self.failed().len(),
            self.skipped_count()
        )
    }
}

/// Runs `cases` against the stack described by `ctx`.
pub async fn run(
    ctx: HarnessContext,
    analytics: AnalyticsClient,
    cases: &[StackCase],
    options: &RunOptions,
) -> Result<SuiteReport> {
    let mut stack = if ctx.config.use_docker {
        Some(ctx.compose_stack()?)
    } else {
        None
    };
    let stack_status = match stack.as_mut() {
        Some(stack) => Some(stack.setup().await?),
        None => None,
    };

    let profile = ctx.profile.clone();
    let suite = Suite {
        os: ctx.os_helper(),
        analytics,
        ctx,
    };

    let mut outcomes = Vec::new();
    for case in cases.iter().filter(|case| options.selects(case.name)) {
        log::info!("{} ... ({})", case.name, case.description);
        let start = Instant::now();
        let status = match (case.run)(&suite).await {
            Ok(Verdict::Passed) => CaseStatus::Passed,
            Ok(Verdict::Skipped(reason)) => CaseStatus::Skipped(reason),
            Err(e) => CaseStatus::Failed(e.to_string()),
        };
        let elapsed = start.elapsed();
        match &status {
            CaseStatus::Passed => log::info!("{} ok ({elapsed:?})", case.name),
            CaseStatus::Skipped(reason) => log::info!("{} skipped: {reason}", case.name),
            CaseStatus::Failed(message) => log::error!("{} FAILED: {message}", case.name),
        }
        outcomes.push(CaseOutcome {
            name: case.name,
            status,
            elapsed,
        });
    }

    let capture = match stack.as_mut() {
        Some(stack) => Some(stack.cleanup().await),
        None => None,
    };

    let report = SuiteReport {
        profile,
        stack: stack_status,
        outcomes,
        capture,
    };
    log::info!("{}", report.summary());
    Ok(report)
}
