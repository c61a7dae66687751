use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::analytics::{AnalyticsConnector, AnalyticsSession, Row};
use crate::error::BoxError;

#[derive(Debug, Default)]
struct Shared {
    rows: Mutex<HashMap<String, Row>>,
    failing: Mutex<HashSet<String>>,
    statements: Mutex<Vec<String>>,
    opened: AtomicUsize,
    released: AtomicUsize,
    refuse_connections: Mutex<Option<String>>,
}

/// In-memory analytics server.
///
/// Queries return the row scripted for their exact SQL, or no row. Every
/// statement (query or DDL) is recorded in order. Sessions are counted when
/// opened and when dropped.
#[derive(Clone, Debug, Default)]
pub struct RecordingConnector {
    shared: Arc<Shared>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(self, sql: &str, row: Row) -> Self {
        if let Ok(mut rows) = self.shared.rows.lock() {
            rows.insert(sql.to_string(), row);
        }
        self
    }

    /// Makes `sql` fail with a server error.
    pub fn failing_on(self, sql: &str) -> Self {
        if let Ok(mut failing) = self.shared.failing.lock() {
            failing.insert(sql.to_string());
        }
        self
    }

    /// Makes every connection attempt fail with `message`.
    pub fn refusing(self, message: &str) -> Self {
        if let Ok(mut refuse) = self.shared.refuse_connections.lock() {
            *refuse = Some(message.to_string());
        }
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.shared
            .statements
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_released(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalyticsConnector for RecordingConnector {
    async fn connect(&self) -> Result<Box<dyn AnalyticsSession>, BoxError> {
        let refused = self
            .shared
            .refuse_connections
            .lock()
            .ok()
            .and_then(|refuse| refuse.clone());
        if let Some(message) = refused {
            return Err(message.into());
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct RecordingSession {
    shared: Arc<Shared>,
}

impl RecordingSession {
    fn record(&self, sql: &str) -> Result<(), BoxError> {
        if let Ok(mut statements) = self.shared.statements.lock() {
            statements.push(sql.to_string());
        }
        let fails = self
            .shared
            .failing
            .lock()
            .map(|failing| failing.contains(sql))
            .unwrap_or(false);
        if fails {
            return Err(format!("Code: 62. DB::Exception: Syntax error: {sql}").into());
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSession for RecordingSession {
    async fn first_row(&mut self, sql: &str) -> Result<Option<Row>, BoxError> {
        self.record(sql)?;
        Ok(self
            .shared
            .rows
            .lock()
            .ok()
            .and_then(|rows| rows.get(sql).cloned()))
    }

    async fn execute(&mut self, sql: &str) -> Result<(), BoxError> {
        self.record(sql)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
    }
}
