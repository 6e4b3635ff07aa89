//! Structured JSON-lines logging for the event pipeline.
//!
//! Every record carries `ts`, `run_id`, a process-wide `seq`, `lvl`,
//! `component` and `event`; a few well-known keys (`event_id`, `event_type`,
//! `symbol`, `queue`, `msg`) are promoted to the top level and everything else
//! lands under `data`.
//!
//! Records go to stdout. When `LOG_DIR` is set they are also written to
//! `<LOG_DIR>/<run_id>/events.jsonl`, with trace/debug going to `trace.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::events::{Event, EventType};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "fatal" => Some(Level::Fatal),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|v| Level::parse(&v))
            .unwrap_or(Level::Info)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (one per pipeline stage)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Market,    // MarketData
    Strategy,  // Signal
    Portfolio, // Order, Position
    Exec,      // Fill
    Accounting,
    Risk,
    Corporate,
    Latency,
    Queue,
    System,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Market => "market",
            Domain::Strategy => "strategy",
            Domain::Portfolio => "portfolio",
            Domain::Exec => "exec",
            Domain::Accounting => "accounting",
            Domain::Risk => "risk",
            Domain::Corporate => "corporate",
            Domain::Latency => "latency",
            Domain::Queue => "queue",
            Domain::System => "system",
        }
    }

    /// Domain of the stage that normally produces `event_type`.
    pub fn for_event(event_type: EventType) -> Self {
        match event_type {
            EventType::MarketData => Domain::Market,
            EventType::Signal => Domain::Strategy,
            EventType::Order | EventType::Position => Domain::Portfolio,
            EventType::Fill => Domain::Exec,
            EventType::PnL => Domain::Accounting,
            EventType::Risk => Domain::Risk,
            EventType::CorporateAction => Domain::Corporate,
            EventType::Latency => Domain::Latency,
        }
    }

    fn allowed_by(&self, spec: &str) -> bool {
        let spec = spec.trim();
        spec == "all" || spec.split(',').any(|d| d.trim() == self.as_str())
    }

    pub fn is_enabled(&self) -> bool {
        match &settings().domains {
            None => true,
            Some(spec) => self.allowed_by(spec),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static SETTINGS: OnceLock<LogSettings> = OnceLock::new();
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

/// Logging configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub min_level: Level,
    /// `LOG_DOMAINS`: `None` or "all" enables everything.
    pub domains: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub run_id: String,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self {
            min_level: Level::from_env(),
            domains: std::env::var("LOG_DOMAINS").ok(),
            log_dir: std::env::var("LOG_DIR").ok().map(PathBuf::from),
            run_id: std::env::var("RUN_ID")
                .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id())),
        }
    }
}

fn settings() -> &'static LogSettings {
    SETTINGS.get_or_init(LogSettings::from_env)
}

#[derive(Debug)]
struct RunContext {
    events: Option<Mutex<BufWriter<File>>>,
    trace: Option<Mutex<BufWriter<File>>>,
}

fn open_sink(dir: &Path, name: &str) -> Option<Mutex<BufWriter<File>>> {
    match File::create(dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    }
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let s = settings();
        let Some(base) = &s.log_dir else {
            return RunContext {
                events: None,
                trace: None,
            };
        };
        let run_dir = base.join(&s.run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let _ = std::fs::write(
            run_dir.join("manifest.json"),
            json!({
                "run_id": s.run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );
        RunContext {
            events: open_sink(&run_dir, "events.jsonl"),
            trace: open_sink(&run_dir, "trace.jsonl"),
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["event_id", "event_type", "symbol", "queue", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Option<Mutex<BufWriter<File>>>, line: &str) {
    if let Some(w) = writer {
        if let Ok(mut w) = w.lock() {
            let _ = writeln!(w, "{}", line);
            let _ = w.flush();
        }
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

pub fn enabled(level: Level, domain: Domain) -> bool {
    level >= settings().min_level && domain.is_enabled()
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if !enabled(level, domain) {
        return;
    }
    let line = render(level, domain, event, fields);
    let ctx = ensure_run_context();
    match level {
        Level::Trace | Level::Debug => write_line(&ctx.trace, &line),
        _ => write_line(&ctx.events, &line),
    }
    println!("{}", line);
}

fn render(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) -> String {
    let (mut top, data) = split_fields(fields);
    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));

    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(settings().run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));
    Value::Object(entry).to_string()
}

/// Envelope fields of `ev` merged with `extra`.
pub fn event_fields(ev: &Event, extra: &[(&str, Value)]) -> Map<String, Value> {
    let mut fields = obj(&[
        ("event_id", v_str(ev.event_id().as_str())),
        ("event_type", v_str(ev.event_type().as_str())),
        ("ts_event", v_str(&ev.ts_event().to_rfc3339())),
        ("seq", ev.seq().map(|s| json!(s)).unwrap_or(Value::Null)),
    ]);
    if let Some(sym) = ev.symbol() {
        fields.insert("symbol".to_string(), v_str(sym));
    }
    for (k, v) in extra {
        fields.insert((*k).to_string(), v.clone());
    }
    fields
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
