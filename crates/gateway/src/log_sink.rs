use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::LogglyConfig;

const LOGGLY_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Destination for leveled access-log messages.
///
/// `emit` is called on the request path after the response has been built,
/// so it must not block and must not fail; delivery problems stay inside the
/// sink.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, message: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "access_log", "{}", message),
            LogLevel::Info => tracing::info!(target: "access_log", "{}", message),
            LogLevel::Warn => tracing::warn!(target: "access_log", "{}", message),
            LogLevel::Error => tracing::error!(target: "access_log", "{}", message),
        }
    }
}

#[derive(Debug)]
pub enum LogSinkError {
    Http(reqwest::Error),
}

impl std::fmt::Display for LogSinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogSinkError::Http(err) => write!(f, "log sink HTTP client error: {}", err),
        }
    }
}

impl std::error::Error for LogSinkError {}

impl From<reqwest::Error> for LogSinkError {
    fn from(value: reqwest::Error) -> Self {
        LogSinkError::Http(value)
    }
}

#[derive(Debug, Serialize)]
struct LogglyRecord {
    level: &'static str,
    message: String,
}

/// Echoes every message to `tracing` and ships it to Loggly from a background
/// task. Messages are dropped when the delivery queue is full.
#[derive(Clone)]
pub struct LogglySink {
    echo: TracingSink,
    queue: mpsc::Sender<LogglyRecord>,
}

impl LogglySink {
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: &LogglyConfig) -> Result<Self, LogSinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        let (queue, receiver) = mpsc::channel(LOGGLY_QUEUE_CAPACITY);
        tokio::spawn(deliver(http, input_url(config), receiver));

        Ok(Self {
            echo: TracingSink,
            queue,
        })
    }
}

impl LogSink for LogglySink {
    fn emit(&self, level: LogLevel, message: &str) {
        self.echo.emit(level, message);

        let record = LogglyRecord {
            level: level.as_str(),
            message: message.to_string(),
        };
        if let Err(err) = self.queue.try_send(record) {
            tracing::debug!(error = %err, "loggly queue rejected message");
        }
    }
}

fn input_url(config: &LogglyConfig) -> String {
    format!(
        "{}/inputs/{}/tag/{}/",
        config.base_url.trim_end_matches('/'),
        config.token,
        config.tag
    )
}

async fn deliver(http: reqwest::Client, url: String, mut receiver: mpsc::Receiver<LogglyRecord>) {
    while let Some(record) = receiver.recv().await {
        match http.post(url.as_str()).json(&record).send().await {
            Ok(resp) if !resp.status().is_success() => {
                tracing::debug!(status = %resp.status(), "loggly rejected message");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(error = %err, "loggly delivery failed");
            }
        }
    }
}
