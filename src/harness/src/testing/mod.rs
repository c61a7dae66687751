//! Fakes for exercising the harness without docker or ClickHouse.
//!
//! Available during tests or with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! harness = { path = "src/harness", features = ["testing"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::testing::{RecordingConnector, ScriptedRunner, TestConfigBuilder};
//!
//! let runner = ScriptedRunner::new()
//!     .respond("docker compose config --services", ProcessOutput::exited(0, "a\nb\n", ""));
//! let connector = RecordingConnector::new().with_row("SELECT 1", row);
//! let config = TestConfigBuilder::new().without_docker().build();
//! ```

mod config_builder;
mod connector;
mod runner;

pub use config_builder::TestConfigBuilder;
pub use connector::RecordingConnector;
pub use runner::ScriptedRunner;
