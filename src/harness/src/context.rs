use std::path::Path;
use std::sync::Arc;

use crate::analytics::{AnalyticsClient, AnalyticsConnector, CatalogSettings};
use crate::clickhouse::ClickHouseConnector;
use crate::compose::{ComposeStack, ManagementPolicy};
use crate::config::{self, TestConfig};
use crate::error::Result;
use crate::os::OsHelper;
use crate::paths::TestPaths;
use crate::process::{ProcessRunner, SystemRunner};

/// Everything a harness run needs, built once at startup and handed to each
/// component.
#[derive(Clone)]
pub struct HarnessContext {
    pub profile: String,
    pub config: TestConfig,
    pub paths: TestPaths,
    pub policy: ManagementPolicy,
    /// Whether this run starts and stops the compose stack. Resolved from
    /// the policy's environment variable by [`HarnessContext::load`].
    pub manage_stack: bool,
    runner: Arc<dyn ProcessRunner>,
}

impl HarnessContext {
    /// Resolves paths from `tests_dir`, loads the profile from there and
    /// reads the management switch for `policy`.
    pub fn load(
        tests_dir: impl AsRef<Path>,
        profile: Option<&str>,
        policy: ManagementPolicy,
    ) -> Result<Self> {
        let paths = TestPaths::from_tests_dir(tests_dir);
        let loaded = config::load(&paths.tests_dir, profile)?;
        let manage_stack = policy.manages_stack_from_env();
        log::debug!("Stack management for {policy:?}: {manage_stack}");
        Ok(Self::new(loaded.profile, loaded.config, paths)
            .with_policy(policy)
            .with_stack_management(manage_stack))
    }

    pub fn new(profile: impl Into<String>, config: TestConfig, paths: TestPaths) -> Self {
        Self {
            profile: profile.into(),
            config,
            paths,
            policy: ManagementPolicy::default(),
            manage_stack: false,
            runner: Arc::new(SystemRunner),
        }
    }

    pub fn with_policy(mut self, policy: ManagementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_stack_management(mut self, manage_stack: bool) -> Self {
        self.manage_stack = manage_stack;
        self
    }

    /// Replaces the process runner used by every component built from here.
    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn runner(&self) -> Arc<dyn ProcessRunner> {
        Arc::clone(&self.runner)
    }

    pub fn os_helper(&self) -> OsHelper {
        OsHelper::new(
            self.runner(),
            &self.paths.tests_dir,
            &self.paths.project_dir,
            &self.config.ice_config,
        )
    }

    /// Client over the native ClickHouse protocol.
    pub fn analytics_client(&self) -> Result<AnalyticsClient> {
        let connector = ClickHouseConnector::from_config(&self.config)?;
        Ok(self.analytics_client_with(Arc::new(connector)))
    }

    pub fn analytics_client_with(&self, connector: Arc<dyn AnalyticsConnector>) -> AnalyticsClient {
        AnalyticsClient::new(connector, CatalogSettings::from_config(&self.config))
    }

    /// Stack manager for the docker directory, managed per `manage_stack`.
    pub fn compose_stack(&self) -> Result<ComposeStack> {
        self.compose_stack_managed(self.manage_stack)
    }

    pub fn compose_stack_managed(&self, manage: bool) -> Result<ComposeStack> {
        ComposeStack::new(
            self.runner(),
            &self.paths.docker_dir,
            self.policy.logs_dir(&self.paths),
            manage,
        )
    }
}
