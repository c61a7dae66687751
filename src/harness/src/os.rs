use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use reqwest::header::AUTHORIZATION;

use crate::error::{HarnessError, Result};
use crate::process::{Invocation, ProcessOutput, ProcessRunner};
use crate::version::Version;

/// Name of the Iceberg REST catalog CLI on `PATH`.
pub const ICE_EXECUTABLE: &str = "ice";

pub const PYTHON_EXECUTABLE: &str = "python";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// What a command must do to count as successful.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandExpectation {
    /// Literal substring of stdout + stderr
    pub output: Option<String>,
    /// Regular expression searched in stdout + stderr
    pub pattern: Option<String>,
    pub return_code: i32,
    pub ignore_return_code: bool,
}

impl Default for CommandExpectation {
    fn default() -> Self {
        Self {
            output: None,
            pattern: None,
            return_code: 0,
            ignore_return_code: false,
        }
    }
}

impl CommandExpectation {
    /// Exit code 0, any output.
    pub fn success() -> Self {
        Self::default()
    }

    pub fn containing(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn matching(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_return_code(mut self, code: i32) -> Self {
        self.return_code = code;
        self
    }

    pub fn ignoring_return_code(mut self) -> Self {
        self.ignore_return_code = true;
        self
    }

    /// Checks a finished process against this expectation.
    pub fn verify(&self, command: &str, output: &ProcessOutput) -> Result<()> {
        if !self.ignore_return_code && output.code != Some(self.return_code) {
            return Err(HarnessError::UnexpectedExitCode {
                command: command.to_string(),
                actual: output.exit_code(),
                expected: self.return_code,
                stdout: output.stdout.clone(),
                stderr: output.stderr.clone(),
            });
        }

        let combined = output.combined();
        if let Some(expected) = &self.output {
            if !combined.contains(expected.as_str()) {
                return Err(HarnessError::MissingOutput {
                    expected: expected.clone(),
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                });
            }
        }

        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern).map_err(|source| HarnessError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            if !regex.is_match(&combined) {
                return Err(HarnessError::PatternMismatch {
                    pattern: pattern.clone(),
                    stdout: output.stdout.clone(),
                    stderr: output.stderr.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Expected response of an HTTP GET.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpExpectation {
    pub status: u16,
    pub timeout: Duration,
    /// Full `Authorization` header value
    pub auth_header: Option<String>,
}

impl Default for HttpExpectation {
    fn default() -> Self {
        Self {
            status: 200,
            timeout: DEFAULT_HTTP_TIMEOUT,
            auth_header: None,
        }
    }
}

impl HttpExpectation {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth(mut self, header: impl Into<String>) -> Self {
        self.auth_header = Some(header.into());
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_auth(format!("Bearer {token}"))
    }
}

/// `Basic <base64(username:password)>`
pub fn generate_basic_auth_header(username: &str, password: &str) -> String {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

/// Resolves `name` to an executable file on `PATH`. Names containing a path
/// separator are checked as given.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Commands, executables and HTTP checks against the host.
pub struct OsHelper {
    runner: Arc<dyn ProcessRunner>,
    http: reqwest::Client,
    tests_dir: PathBuf,
    project_dir: PathBuf,
    ice_config: String,
}

impl OsHelper {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        tests_dir: impl Into<PathBuf>,
        project_dir: impl Into<PathBuf>,
        ice_config: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            http: reqwest::Client::new(),
            tests_dir: tests_dir.into(),
            project_dir: project_dir.into(),
            ice_config: ice_config.into(),
        }
    }

    /// Runs `argv` and checks it against `expect`. Returns the captured
    /// output on success.
    pub async fn run_command<S: AsRef<str>>(
        &self,
        argv: &[S],
        expect: &CommandExpectation,
    ) -> Result<ProcessOutput> {
        let invocation = Invocation::from_argv(argv).ok_or(HarnessError::EmptyCommand)?;
        let command = invocation.to_string();
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|source| HarnessError::Spawn {
                command: command.clone(),
                source,
            })?;

        expect.verify(&command, &output)?;
        log::info!(
            "Command executed successfully: {}...",
            argv.iter()
                .take(3)
                .map(|arg| arg.as_ref())
                .collect::<Vec<&str>>()
                .join(" ")
        );
        Ok(output)
    }

    /// Runs `ice -c <tests_dir>/<ice_config> <args...>`.
    pub async fn run_ice_command<S: AsRef<str>>(
        &self,
        args: &[S],
        expect: &CommandExpectation,
    ) -> Result<ProcessOutput> {
        self.find_executable(ICE_EXECUTABLE)?;

        let config_file = self.tests_dir.join(&self.ice_config);
        let mut argv = vec![
            ICE_EXECUTABLE.to_string(),
            "-c".to_string(),
            config_file.to_string_lossy().into_owned(),
        ];
        argv.extend(args.iter().map(|arg| arg.as_ref().to_string()));
        self.run_command(argv.as_slice(), expect).await
    }

    /// Runs `python <project_dir>/<script>` from the project directory.
    pub async fn run_python_script(&self, script: &str) -> Result<ProcessOutput> {
        let script_path = self.project_dir.join(script);
        let not_found = || HarnessError::ScriptNotFound {
            script: script.to_string(),
            dir: self.project_dir.clone(),
        };
        if !script_path.is_file() {
            return Err(not_found());
        }

        let invocation = Invocation::new(
            PYTHON_EXECUTABLE,
            [script_path.to_string_lossy().into_owned()],
        )
        .in_dir(&self.project_dir);
        let output = self.runner.run(&invocation).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                not_found()
            } else {
                HarnessError::Spawn {
                    command: invocation.to_string(),
                    source,
                }
            }
        })?;

        if !output.success() {
            return Err(HarnessError::ScriptFailed {
                script: script.to_string(),
                code: output.exit_code(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        log::info!("{script} executed successfully");
        log::debug!("stdout: {}", output.stdout);
        Ok(output)
    }

    pub fn find_executable(&self, name: &str) -> Result<PathBuf> {
        let path = self
            .runner
            .resolve(name)
            .ok_or_else(|| HarnessError::ExecutableNotFound(name.to_string()))?;
        log::info!("Found '{name}' at: {}", path.display());
        Ok(path)
    }

    /// Runs `<executable> <flag>` and requires the reported version to be at
    /// least `min_version`.
    ///
    /// With `pattern`, the version is taken from its first capture group;
    /// otherwise the whole output is searched.
    pub async fn check_executable_version(
        &self,
        executable: &str,
        min_version: &str,
        flag: &str,
        pattern: Option<&str>,
    ) -> Result<Version> {
        let required = Version::parse(min_version)
            .ok_or_else(|| HarnessError::InvalidMinimumVersion(min_version.to_string()))?;

        let invocation = Invocation::new(executable, [flag]);
        let output = self.runner.run(&invocation).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                HarnessError::ExecutableNotFound(executable.to_string())
            } else {
                HarnessError::Spawn {
                    command: invocation.to_string(),
                    source,
                }
            }
        })?;
        let combined = output.combined();

        let version_text = match pattern {
            Some(pattern) => {
                let regex = Regex::new(pattern).map_err(|source| HarnessError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
                regex
                    .captures(&combined)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            }
            None => Some(combined.clone()),
        };

        let actual = version_text
            .as_deref()
            .and_then(Version::parse)
            .ok_or_else(|| HarnessError::UnparseableVersion {
                executable: executable.to_string(),
                flag: flag.to_string(),
                output: combined.clone(),
            })?;

        if actual < required {
            return Err(HarnessError::VersionTooOld {
                executable: executable.to_string(),
                actual,
                required: min_version.to_string(),
            });
        }
        log::info!("'{executable}' version {actual} >= {min_version}");
        Ok(actual)
    }

    /// GETs `url` and requires the expected status code.
    pub async fn http_get(&self, url: &str, expect: &HttpExpectation) -> Result<reqwest::Response> {
        let mut request = self.http.get(url).timeout(expect.timeout);
        if let Some(header) = &expect.auth_header {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request.send().await.map_err(|source| {
            log::warn!("HTTP request failed for URL: {url}");
            HarnessError::HttpTransport {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status().as_u16();
        if status != expect.status {
            return Err(HarnessError::HttpStatus {
                url: url.to_string(),
                expected: expect.status,
                actual: status,
            });
        }
        log::info!("HTTP GET to {url} successful: {status}");
        Ok(response)
    }
}
