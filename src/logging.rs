//! Structured logging for burst runs and the heartbeat channel
//!
//! This module provides:
//! - Leveled records with structured fields and correlation IDs
//! - Console, JSON and compact output formats
//! - Run and channel loggers that know which fields matter for their events
//! - A capture sink so tests can inspect what was logged

use crate::error::{AppError, Result};
use crate::heartbeat::Direction;
use crate::models::{Config, RequestResult, RequestTask, TestConfig, TestSummary};
use crate::types::ChannelState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }

    /// Minimum level implied by the verbosity flags
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            LogLevel::Debug
        } else if verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID tying the record to one run or session
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// In-memory destination that replaces stdout/stderr, used by tests
pub type LogSink = Arc<Mutex<Vec<LogRecord>>>;

#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Logger with leveled, structured output
#[derive(Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
    sink: Option<LogSink>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: &str) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
            sink: None,
        }
    }

    /// Create a logger whose level and format follow the configuration
    pub fn with_config(name: &str, config: &Config) -> Self {
        Self {
            min_level: LogLevel::from_flags(config.verbose, config.debug),
            use_color: config.enable_color,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name: name.to_string(),
            context: Arc::new(RwLock::new(LogContext::default())),
            sink: None,
        }
    }

    /// Logger that records everything into memory instead of writing it out
    pub fn capturing(name: &str) -> (Self, LogSink) {
        let sink: LogSink = Arc::new(Mutex::new(Vec::new()));
        let mut logger = Self::new(name);
        logger.min_level = LogLevel::Trace;
        logger.sink = Some(sink.clone());
        (logger, sink)
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add context field for all subsequent records
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key.to_string(), json_value);
        }
    }

    /// Create a record builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogRecordBuilder<'_> {
        LogRecordBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogRecordBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogRecordBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogRecordBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogRecordBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogRecordBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_record(&self, mut record: LogRecord) {
        if record.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            record.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            record.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        if let Some(sink) = &self.sink {
            if let Ok(mut records) = sink.lock() {
                records.push(record);
            }
            return;
        }

        let output = match self.format {
            LogFormat::Console => self.format_console(&record),
            LogFormat::Json => self.format_json(&record),
            LogFormat::Compact => self.format_compact(&record),
        };

        // Errors and warnings go to stderr, others to stdout
        if record.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn format_console(&self, record: &LogRecord) -> String {
        let timestamp = record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = record.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", record.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, record.logger, record.message);

        if let Some(correlation_id) = &record.correlation_id {
            let short: String = correlation_id.chars().take(8).collect();
            output.push_str(&format!(" [{}]", short));
        }

        if !record.fields.is_empty() {
            let mut fields: Vec<String> = record.fields.iter()
                .filter(|(k, _)| k.as_str() != "session_id")
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields.sort();
            if !fields.is_empty() {
                output.push_str(&format!(" {{{}}}", fields.join(", ")));
            }
        }

        output
    }

    fn format_json(&self, record: &LogRecord) -> String {
        match serde_json::to_string(record) {
            Ok(json) => json,
            Err(_) => serde_json::json!({
                "error": "Failed to serialize log record",
                "message": record.message,
            }).to_string(),
        }
    }

    fn format_compact(&self, record: &LogRecord) -> String {
        let timestamp = record.timestamp.format("%H:%M:%S");
        format!("{} {} {}: {}",
            timestamp,
            record.level.as_str().chars().next().unwrap_or('?'),
            record.logger,
            record.message
        )
    }
}

/// Builder pattern for creating log records
pub struct LogRecordBuilder<'a> {
    logger: &'a Logger,
    record: LogRecord,
}

impl<'a> LogRecordBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            record: LogRecord {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.record.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.record.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the fields describing one settled request
    pub fn request_result(self, result: &RequestResult) -> Self {
        self.field("index", result.index)
            .field("duration_ms", result.duration_ms)
            .field("requested_delay_secs", result.requested_delay_secs)
            .field("success", result.is_success())
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the record
    pub async fn log(self) {
        self.logger.write_record(self.record).await;
    }
}

/// Logger for burst runs: start, dispatch, settle, summary, rejection
#[derive(Clone)]
pub struct RunLogger {
    logger: Logger,
}

impl RunLogger {
    pub fn new(config: &Config) -> Self {
        Self { logger: Logger::with_config("RUN", config) }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// Logger that discards below Warn and writes to the console
    pub fn quiet() -> Self {
        let mut logger = Logger::new("RUN");
        logger.set_level(LogLevel::Warn);
        Self { logger }
    }

    pub async fn log_run_started(&self, run_id: &str, config: &TestConfig, target: &str) {
        self.logger.info(&format!("Starting burst of {} requests against {}", config.request_count, target))
            .correlation_id(run_id)
            .field("request_count", config.request_count)
            .field("initial_launch_delay_ms", config.initial_launch_delay_ms)
            .field("launch_delay_increment_ms", config.launch_delay_increment_ms)
            .field("initial_endpoint_delay_secs", config.initial_endpoint_delay_secs)
            .field("endpoint_delay_increment_secs", config.endpoint_delay_increment_secs)
            .log()
            .await;
    }

    pub async fn log_dispatch(&self, run_id: &str, task: &RequestTask) {
        self.logger.debug(&format!("Dispatching request {}", task.index))
            .correlation_id(run_id)
            .field("index", task.index)
            .field("target_delay_secs", task.target_endpoint_delay_secs)
            .field("pause_after_ms", task.launch_delay_after_previous.as_millis() as u64)
            .log()
            .await;
    }

    pub async fn log_result(&self, run_id: &str, result: &RequestResult) {
        let (level, message) = match result.error_message() {
            None => (LogLevel::Debug, format!("Request {} succeeded in {:.2}ms", result.index, result.duration_ms)),
            Some(error) => (LogLevel::Warn, format!("Request {} failed after {:.2}ms: {}", result.index, result.duration_ms, error)),
        };

        self.logger.log(level, &message)
            .correlation_id(run_id)
            .request_result(result)
            .log()
            .await;
    }

    pub async fn log_run_complete(&self, run_id: &str, summary: &TestSummary) {
        self.logger.info(&format!(
            "Burst completed in {:.2}s: {}/{} successful",
            summary.total_duration_ms / 1000.0,
            summary.success_count,
            summary.request_count
        ))
            .correlation_id(run_id)
            .field("total_duration_ms", summary.total_duration_ms)
            .field("success_count", summary.success_count)
            .field("failure_count", summary.failure_count())
            .field("success_rate_percent", summary.success_rate_percent)
            .log()
            .await;
    }

    pub async fn log_rejected(&self, error: &AppError) {
        self.logger.warn(&format!("Burst rejected: {}", error.detail()))
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_busy(&self) {
        self.logger.warn("Burst ignored: a run is already in progress")
            .log()
            .await;
    }
}

/// Logger for the heartbeat channel: lifecycle, frames, transport errors
#[derive(Clone)]
pub struct ChannelLogger {
    logger: Logger,
}

impl ChannelLogger {
    pub fn new(config: &Config) -> Self {
        Self { logger: Logger::with_config("WS", config) }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn quiet() -> Self {
        let mut logger = Logger::new("WS");
        logger.set_level(LogLevel::Warn);
        Self { logger }
    }

    pub async fn log_state_change(&self, url: &str, from: ChannelState, to: ChannelState) {
        self.logger.info(&format!("Heartbeat channel {} -> {}", from, to))
            .field("url", url)
            .field("from", from.to_string())
            .field("to", to.to_string())
            .log()
            .await;
    }

    pub async fn log_frame(&self, direction: Direction, text: &str) {
        self.logger.trace(&format!("{} frame", direction))
            .field("direction", direction)
            .field("bytes", text.len())
            .log()
            .await;
    }

    pub async fn log_connect_failure(&self, url: &str, error: &AppError) {
        self.logger.error(&format!("Failed to connect to {}: {}", url, error.detail()))
            .field("url", url)
            .error_info(error)
            .log()
            .await;
    }

    pub async fn log_unexpected_close(&self, url: &str, reason: &str) {
        self.logger.warn(&format!("Heartbeat connection closed unexpectedly: {}", reason))
            .field("url", url)
            .log()
            .await;
    }

    pub async fn log_transport_error(&self, url: &str, error: &AppError) {
        self.logger.error(&format!("Heartbeat transport error: {}", error.detail()))
            .field("url", url)
            .error_info(error)
            .log()
            .await;
    }
}

/// Creates loggers sharing one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a named logger tagged with the session id
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name, &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_run_logger(&self) -> RunLogger {
        RunLogger::from_logger(self.create_logger("RUN").await)
    }

    pub async fn create_channel_logger(&self) -> ChannelLogger {
        ChannelLogger::from_logger(self.create_logger("WS").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
