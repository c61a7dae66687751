//! Shared helpers for the harness integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use harness::testing::ScriptedRunner;
use harness::{HarnessContext, TestConfig, TestPaths};
use tempfile::TempDir;

/// Initialize test logging
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `<temp>/repo/project/tests`, created, with the matching paths.
pub fn temp_layout() -> (TempDir, TestPaths) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let tests_dir: PathBuf = temp_dir.path().join("repo").join("project").join("tests");
    std::fs::create_dir_all(&tests_dir).expect("Failed to create tests dir");
    let paths = TestPaths::from_tests_dir(&tests_dir);
    std::fs::create_dir_all(&paths.docker_dir).expect("Failed to create docker dir");
    (temp_dir, paths)
}

/// Context over a temp layout whose processes are answered by `runner`.
/// The stack is never managed, whatever the environment says.
pub fn scripted_context(config: TestConfig, runner: Arc<ScriptedRunner>) -> (TempDir, HarnessContext) {
    let (temp_dir, paths) = temp_layout();
    let ctx = HarnessContext::new("test", config, paths)
        .with_runner(runner)
        .with_stack_management(false);
    (temp_dir, ctx)
}
