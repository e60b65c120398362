//! JSONL event stream for summarize sessions, and the `telemetry report` view of it.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::config::RuntimeConfig;

/// Events the report lists individually, in lifecycle order.
pub const REPORTED_EVENTS: &[&str] = &[
    "command.completed",
    "command.failed",
    "session.completed",
    "session.turn_limit",
    "model.retry",
    "capability.requested",
    "capability.succeeded",
    "capability.failed",
    "delivery.warning",
];

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone)]
pub struct TelemetrySink {
    path: Option<PathBuf>,
    run_id: String,
    command: String,
    session_id: String,
    write_lock: Arc<Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        Self {
            path: cfg
                .telemetry_enabled
                .then(|| PathBuf::from(&cfg.telemetry_path)),
            run_id: format!("run-{}-{}", now_unix_ms(), std::process::id()),
            command,
            session_id: String::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            run_id: String::new(),
            command: String::new(),
            session_id: String::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Same sink, tagging subsequent events with `session_id`.
    pub fn for_session(&self, session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            ..self.clone()
        }
    }

    /// Appends one event line. Payload fields never override the envelope.
    pub fn emit(&self, event: &str, payload: Value) {
        let Some(path) = self.path.as_deref() else {
            return;
        };

        let mut record = json!({
            "ts_unix_ms": now_unix_ms(),
            "event": event,
            "run_id": self.run_id,
            "command": self.command,
            "session_id": self.session_id,
        });
        if let (Some(envelope), Some(fields)) = (record.as_object_mut(), payload.as_object()) {
            for (key, value) in fields {
                envelope
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        if let Err(err) = self.append(path, &record) {
            tracing::warn!(event = event, path = %path.display(), error = %err, "telemetry write failed");
        }
    }

    fn append(&self, path: &Path, record: &Value) -> Result<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create telemetry directory '{}'", parent.display())
            })?;
        }

        let mut line = serde_json::to_string(record).context("failed to encode telemetry event")?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()))
            .with_context(|| format!("failed to append to telemetry file '{}'", path.display()))
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySummary {
    pub lines: usize,
    pub parsed: usize,
    pub parse_errors: usize,
    pub runs: BTreeSet<String>,
    pub sessions: BTreeSet<String>,
    pub event_counts: BTreeMap<String, usize>,
    pub last_ts_unix_ms: Option<i64>,
}

impl TelemetrySummary {
    pub fn count(&self, event: &str) -> usize {
        self.event_counts.get(event).copied().unwrap_or(0)
    }

    fn record(&mut self, event: &Value) {
        self.parsed += 1;
        let field = |key: &str| {
            event
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        if let Some(run_id) = field("run_id") {
            self.runs.insert(run_id);
        }
        if let Some(session_id) = field("session_id") {
            self.sessions.insert(session_id);
        }
        if let Some(name) = field("event") {
            *self.event_counts.entry(name).or_default() += 1;
        }
        if let Some(ts) = event.get("ts_unix_ms").and_then(Value::as_i64) {
            self.last_ts_unix_ms = self.last_ts_unix_ms.max(Some(ts));
        }
    }
}

/// Summarizes the newest `limit` lines; blank lines are skipped, bad JSON is counted.
pub fn summarize_telemetry_lines(lines: Vec<String>, limit: usize) -> TelemetrySummary {
    let mut summary = TelemetrySummary {
        lines: lines.len(),
        ..TelemetrySummary::default()
    };
    let start = lines.len().saturating_sub(limit.max(1));

    for line in lines[start..]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
    {
        match serde_json::from_str::<Value>(line) {
            Ok(event) => summary.record(&event),
            Err(_) => summary.parse_errors += 1,
        }
    }

    summary
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let file = std::fs::File::open(&path)
        .with_context(|| format!("failed to open telemetry file '{}'", path.display()))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<String>>>()
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?;
    let summary = summarize_telemetry_lines(lines, limit);

    println!("Telemetry report: {}", path.display());
    println!(
        "Events analyzed: {} of {} lines (parse_errors={})",
        summary.parsed, summary.lines, summary.parse_errors
    );
    println!(
        "Runs: {}  Sessions: {}",
        summary.runs.len(),
        summary.sessions.len()
    );
    for event in REPORTED_EVENTS {
        println!("- {event}: {}", summary.count(event));
    }
    if let Some(ts) = summary.last_ts_unix_ms {
        println!("Last event ts_unix_ms: {ts}");
    }

    Ok(())
}
