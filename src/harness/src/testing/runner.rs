use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::process::{Invocation, ProcessOutput, ProcessRunner};

#[derive(Clone, Debug)]
enum Response {
    Output(ProcessOutput),
    SpawnError(io::ErrorKind),
}

/// Answers invocations from a table keyed by the command line, e.g.
/// `"docker compose logs --no-color clickhouse"`.
///
/// Unscripted commands fail to spawn with [`io::ErrorKind::NotFound`].
/// Every invocation is recorded. Only executables added with
/// [`ScriptedRunner::with_executable`] resolve.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, Response>>,
    executables: Mutex<HashMap<String, PathBuf>>,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command: &str, output: ProcessOutput) -> Self {
        self.insert(command, Response::Output(output));
        self
    }

    /// Makes `command` fail to spawn with `kind`.
    pub fn fail(self, command: &str, kind: io::ErrorKind) -> Self {
        self.insert(command, Response::SpawnError(kind));
        self
    }

    /// Makes `name` resolve to `path`.
    pub fn with_executable(self, name: &str, path: impl Into<PathBuf>) -> Self {
        if let Ok(mut executables) = self.executables.lock() {
            executables.insert(name.to_string(), path.into());
        }
        self
    }

    /// Command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    fn insert(&self, command: &str, response: Response) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(command.to_string(), response);
        }
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        let command = invocation.to_string();
        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&command).cloned());

        match response {
            Some(Response::Output(output)) => Ok(output),
            Some(Response::SpawnError(kind)) => Err(io::Error::new(kind, command)),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("unscripted command: {command}"),
            )),
        }
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.executables
            .lock()
            .ok()
            .and_then(|executables| executables.get(name).cloned())
    }
}
