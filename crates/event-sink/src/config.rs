// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::SinkError;
use serde::Deserialize;
use std::{env, fmt, str::FromStr, time::Duration};
use tokio::sync::Semaphore;

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 1000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// What `send` does when the ingestion queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Wait for room; fail with [`SinkError::Closed`] once the sink shuts down.
    Block,
    /// Discard the record and count it. Never waits, never errors.
    #[default]
    Drop,
}

impl FromStr for OverflowPolicy {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "drop" => Ok(Self::Drop),
            other => Err(SinkError::InvalidConfig(format!(
                "Invalid overflow policy '{other}'. Must be one of: block, drop"
            ))),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Drop => write!(f, "drop"),
        }
    }
}

/// Sink configuration. Fixed once the sink is built.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Collector endpoint receiving `POST`ed NDJSON bodies.
    pub collector_url: String,
    /// Skip TLS certificate verification for this sink's client only.
    pub insecure: bool,
    /// How long the worker waits after a flush before flushing whatever is buffered.
    pub flush_interval: Duration,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
    /// Ship every record on its own as soon as it is dequeued.
    pub flush_on_every_record: bool,
    /// Size threshold for a flush when records are accumulated.
    pub max_batch_records: usize,
    pub request_timeout: Duration,
    pub https_proxy: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            collector_url: String::new(),
            insecure: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            flush_on_every_record: true,
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            https_proxy: None,
        }
    }
}

impl SinkConfig {
    /// Default configuration pointed at `collector_url`.
    pub fn new(collector_url: impl Into<String>) -> Self {
        Self {
            collector_url: collector_url.into(),
            ..Default::default()
        }
    }

    /// Create configuration from `SINK_*` environment variables.
    pub fn from_env() -> Result<Self, SinkError> {
        let collector_url = env::var("SINK_COLLECTOR_URL").unwrap_or_default();
        let insecure = env::var("SINK_INSECURE")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);
        let flush_interval = env::var("SINK_FLUSH_INTERVAL_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_FLUSH_INTERVAL);
        let queue_capacity = env::var("SINK_QUEUE_CAPACITY")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);
        let overflow_policy = match env::var("SINK_OVERFLOW_POLICY") {
            Ok(val) => val.parse::<OverflowPolicy>()?,
            Err(_) => OverflowPolicy::default(),
        };
        let flush_on_every_record = env::var("SINK_FLUSH_ON_EVERY_RECORD")
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);
        let max_batch_records = env::var("SINK_MAX_BATCH_RECORDS")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_BATCH_RECORDS);
        let request_timeout = env::var("SINK_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let https_proxy = env::var("SINK_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        let config = Self {
            collector_url,
            insecure,
            flush_interval,
            queue_capacity,
            overflow_policy,
            flush_on_every_record,
            max_batch_records,
            request_timeout,
            https_proxy,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SinkError> {
        if self.collector_url.trim().is_empty() {
            return Err(SinkError::InvalidConfig(
                "collector URL cannot be empty".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.collector_url).map_err(|e| {
            SinkError::InvalidConfig(format!(
                "Invalid collector URL '{}': {e}",
                self.collector_url
            ))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SinkError::InvalidConfig(format!(
                "Collector URL scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.queue_capacity == 0 {
            return Err(SinkError::InvalidConfig(
                "queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity > Semaphore::MAX_PERMITS {
            return Err(SinkError::InvalidConfig(format!(
                "queue capacity must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.flush_interval.is_zero() {
            return Err(SinkError::InvalidConfig(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        if self.max_batch_records == 0 {
            return Err(SinkError::InvalidConfig(
                "max batch records must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(SinkError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
