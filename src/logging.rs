//! Relay log: a bounded in-memory history of request events, mirrored to a
//! JSONL file so the history survives restarts.
//!
//! Console diagnostics go through `tracing`; this log keeps one line per
//! noteworthy step of an exchange (intake, upstream open, finish, failure,
//! disconnect), tagged with the request id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const MAX_LOG_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            request_id: None,
            message: message.into(),
            context: None,
        }
    }

    #[must_use]
    pub fn for_request(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }

    #[must_use]
    pub fn with_context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

struct RelayLog {
    entries: VecDeque<LogEntry>,
    writer: Option<BufWriter<File>>,
}

impl RelayLog {
    fn open(file_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut log = Self::in_memory();

        if file_path.exists() {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines().map_while(std::result::Result::ok) {
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line) {
                    log.remember(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        log.writer = Some(BufWriter::new(file));

        Ok(log)
    }

    fn in_memory() -> Self {
        Self {
            entries: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            writer: None,
        }
    }

    fn remember(&mut self, entry: LogEntry) {
        if self.entries.len() >= MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    fn append(&mut self, entry: LogEntry) {
        if let Some(ref mut writer) = self.writer {
            if let Ok(json) = serde_json::to_string(&entry) {
                let _ = writeln!(writer, "{json}");
                let _ = writer.flush();
            }
        }
        self.remember(entry);
    }
}

/// Cheaply cloneable handle shared by the router and every request stream.
#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<RelayLog>>);

impl SharedLogger {
    /// Open (or create) the JSONL file and replay its tail into memory.
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(RelayLog::open(
            file_path.as_ref(),
        )?))))
    }

    /// A logger that never touches the filesystem.
    #[must_use]
    pub fn in_memory() -> Self {
        Self(Arc::new(Mutex::new(RelayLog::in_memory())))
    }

    pub fn log(&self, entry: LogEntry) {
        if let Ok(mut log) = self.0.lock() {
            log.append(entry);
        }
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, component, message));
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, component, message));
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.0
            .lock()
            .map(|log| log.entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// All retained entries for one request, oldest first.
    pub fn for_request(&self, request_id: Uuid) -> Vec<LogEntry> {
        self.0
            .lock()
            .map(|log| {
                log.entries
                    .iter()
                    .filter(|e| e.request_id == Some(request_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
