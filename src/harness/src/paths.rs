use std::path::{Path, PathBuf};

/// Directory holding the compose file, below the repository root.
pub const DOCKER_DIR: &str = "docker";

/// Directory layout around the harness.
///
/// ```text
/// <repo_root>/
///   docker/               compose file
///   <project_dir>/        example scripts (iceberg_setup.py, ...)
///     tests/              profiles, ice config, execution_logs/
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestPaths {
    pub tests_dir: PathBuf,
    pub project_dir: PathBuf,
    pub repo_root: PathBuf,
    pub docker_dir: PathBuf,
}

impl TestPaths {
    /// Walks two levels up from `tests_dir` and joins `docker/` onto the root.
    pub fn from_tests_dir(tests_dir: impl AsRef<Path>) -> Self {
        let tests_dir = absolute(tests_dir.as_ref());
        let project_dir = parent_or_self(&tests_dir);
        let repo_root = parent_or_self(&project_dir);
        let docker_dir = repo_root.join(DOCKER_DIR);

        log::debug!("Initialized paths: tests={}", tests_dir.display());
        Self {
            tests_dir,
            project_dir,
            repo_root,
            docker_dir,
        }
    }

    /// Paths for the `tests/` directory next to a crate manifest.
    pub fn from_manifest_dir(manifest_dir: impl AsRef<Path>) -> Self {
        Self::from_tests_dir(manifest_dir.as_ref().join("tests"))
    }

    pub fn execution_logs_dir(&self) -> PathBuf {
        self.tests_dir.join("execution_logs")
    }

    pub fn compose_logs_dir(&self) -> PathBuf {
        self.docker_dir.join("test_logs")
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn parent_or_self(path: &Path) -> PathBuf {
    path.parent().unwrap_or(path).to_path_buf()
}
