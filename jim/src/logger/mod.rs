use crate::config::{ConfigError, EngineConfig, LogFormat};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogLevel {
    ERROR,
    WARN,
    INFO,
    DEBUG,
    TRACE,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::ERROR,
            log::Level::Warn => LogLevel::WARN,
            log::Level::Info => LogLevel::INFO,
            log::Level::Debug => LogLevel::DEBUG,
            log::Level::Trace => LogLevel::TRACE,
        }
    }
}

/// One log record rendered as a JSON line.
#[derive(Debug, Serialize)]
pub struct LogEntry<'a> {
    timestamp: String,
    level: LogLevel,
    target: &'a str,
    thread: Option<&'a str>,
    file: Option<&'a str>,
    line: Option<u32>,
    message: &'a str,
}

impl<'a> LogEntry<'a> {
    pub fn new(
        level: LogLevel,
        target: &'a str,
        thread: Option<&'a str>,
        file: Option<&'a str>,
        line: Option<u32>,
        message: &'a str,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level,
            target,
            thread,
            file,
            line,
            message,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or(String::from("Error serializing log entry"))
    }
}

/// Installs `env_logger` as the global logger using the engine config.
///
/// Fails if another logger has already been installed in this process.
pub fn init(config: &EngineConfig) -> Result<(), ConfigError> {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.log_filter);
    if config.log_format == LogFormat::Json {
        builder.format(|buf, record| {
            let message = record.args().to_string();
            let thread = std::thread::current();
            let entry = LogEntry::new(
                record.level().into(),
                record.target(),
                thread.name(),
                record.file(),
                record.line(),
                &message,
            );
            writeln!(buf, "{}", entry.to_json())
        });
    }
    builder
        .try_init()
        .map_err(|e| ConfigError::logger(e.to_string()))
}
