//! Integration harness for the Antalya stack: ice REST catalog, ClickHouse
//! vector server and swarm nodes, deployed by docker compose or reached on
//! an existing cluster.

pub mod analytics;
pub mod cli;
pub mod clickhouse;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod os;
pub mod paths;
pub mod process;
pub mod suite;
pub mod version;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use analytics::{AnalyticsClient, CatalogSettings, Row};
pub use compose::{CaptureReport, ComposeStack, ManagementPolicy, StackStatus};
pub use config::{LoadedConfig, TestConfig};
pub use context::HarnessContext;
pub use error::{HarnessError, Result};
pub use os::{CommandExpectation, HttpExpectation, OsHelper};
pub use paths::TestPaths;
pub use suite::{RunOptions, SuiteReport};
