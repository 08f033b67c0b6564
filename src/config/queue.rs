//! Queue tuning and named queue-set configuration.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{Priority, QueueMode};

const ENV_PREFIX: &str = "WORKQUEUE_";

/// Tuning shared by every queue created from it.
///
/// All fields have defaults, so a partial JSON document (or `{}`) is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Override for the detected hardware thread count.
    pub hardware_concurrency: Option<usize>,
    /// Hard cap on the width of concurrent queues.
    pub max_width: Option<usize>,
    /// Multiplier applied to the hardware thread count for `High` queues.
    pub high_burst_factor: usize,
    /// Divisor applied to the hardware thread count for `Background` queues.
    pub background_divisor: usize,
    /// How long an idle worker waits for work before it retires.
    pub idle_timeout_ms: u64,
    /// Stack size for worker threads; platform default when unset.
    pub thread_stack_size: Option<usize>,
    /// Prefix of worker thread names.
    pub thread_name_prefix: String,
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            hardware_concurrency: None,
            max_width: None,
            high_burst_factor: 2,
            background_divisor: 2,
            idle_timeout_ms: 2_000,
            thread_stack_size: None,
            thread_name_prefix: "wq".into(),
        }
    }
}

impl WorkQueueConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the hardware thread count used by the width heuristic.
    #[must_use]
    pub const fn with_hardware_concurrency(mut self, threads: usize) -> Self {
        self.hardware_concurrency = Some(threads);
        self
    }

    /// Caps the width of concurrent queues.
    #[must_use]
    pub const fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }

    /// Sets the `High` burst multiplier.
    #[must_use]
    pub const fn with_high_burst_factor(mut self, factor: usize) -> Self {
        self.high_burst_factor = factor;
        self
    }

    /// Sets the `Background` divisor.
    #[must_use]
    pub const fn with_background_divisor(mut self, divisor: usize) -> Self {
        self.background_divisor = divisor;
        self
    }

    /// Sets the idle retirement grace period.
    ///
    /// Stored in whole milliseconds, rounded up, so any non-zero duration
    /// stays non-zero. Durations past `u64::MAX` milliseconds saturate.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.idle_timeout_ms = if millis > u64::MAX as u128 {
            u64::MAX
        } else {
            millis as u64
        };
        self
    }

    /// Sets the worker stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }

    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Idle retirement grace period.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Hardware thread count, detected unless overridden.
    #[must_use]
    pub fn hardware_concurrency(&self) -> usize {
        self.hardware_concurrency.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.hardware_concurrency == Some(0) {
            return Err("hardware_concurrency must be greater than 0".into());
        }
        if self.max_width == Some(0) {
            return Err("max_width must be greater than 0".into());
        }
        if self.high_burst_factor == 0 {
            return Err("high_burst_factor must be greater than 0".into());
        }
        if self.background_divisor == 0 {
            return Err("background_divisor must be greater than 0".into());
        }
        if self.idle_timeout_ms == 0 {
            return Err("idle_timeout_ms must be greater than 0".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `WORKQUEUE_*` environment variables, loading a
    /// `.env` file first if one is present.
    ///
    /// Recognized: `WORKQUEUE_HARDWARE_CONCURRENCY`, `WORKQUEUE_MAX_WIDTH`,
    /// `WORKQUEUE_HIGH_BURST_FACTOR`, `WORKQUEUE_BACKGROUND_DIVISOR`,
    /// `WORKQUEUE_IDLE_TIMEOUT_MS`, `WORKQUEUE_THREAD_STACK_SIZE`,
    /// `WORKQUEUE_THREAD_NAME_PREFIX`.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse or validate.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<L>(lookup: L) -> Result<Self, String>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = get("HARDWARE_CONCURRENCY") {
            cfg.hardware_concurrency = Some(parse_var("HARDWARE_CONCURRENCY", &v)?);
        }
        if let Some(v) = get("MAX_WIDTH") {
            cfg.max_width = Some(parse_var("MAX_WIDTH", &v)?);
        }
        if let Some(v) = get("HIGH_BURST_FACTOR") {
            cfg.high_burst_factor = parse_var("HIGH_BURST_FACTOR", &v)?;
        }
        if let Some(v) = get("BACKGROUND_DIVISOR") {
            cfg.background_divisor = parse_var("BACKGROUND_DIVISOR", &v)?;
        }
        if let Some(v) = get("IDLE_TIMEOUT_MS") {
            cfg.idle_timeout_ms = parse_var("IDLE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("THREAD_STACK_SIZE") {
            cfg.thread_stack_size = Some(parse_var("THREAD_STACK_SIZE", &v)?);
        }
        if let Some(v) = get("THREAD_NAME_PREFIX") {
            cfg.thread_name_prefix = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{ENV_PREFIX}{name}: {e}"))
}

/// One named queue in a [`SchedulerConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    /// Scheduling class.
    #[serde(default)]
    pub priority: Priority,
    /// Serial or concurrent execution.
    #[serde(default)]
    pub mode: QueueMode,
    /// Per-queue tuning; falls back to [`SchedulerConfig::defaults`].
    #[serde(default)]
    pub config: Option<WorkQueueConfig>,
}

/// Root configuration describing a set of named queues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tuning applied to queues without their own `config`.
    #[serde(default)]
    pub defaults: WorkQueueConfig,
    /// Map of queue identifier to its definition.
    pub queues: HashMap<String, QueueSpec>,
}

impl SchedulerConfig {
    /// Effective tuning for `spec`.
    #[must_use]
    pub fn resolve<'a>(&'a self, spec: &'a QueueSpec) -> &'a WorkQueueConfig {
        spec.config.as_ref().unwrap_or(&self.defaults)
    }

    /// Validate defaults and every queue; at least one queue must exist.
    ///
    /// # Errors
    ///
    /// Returns the first problem found, prefixed with the queue name.
    pub fn validate(&self) -> Result<(), String> {
        if self.queues.is_empty() {
            return Err("at least one queue must be defined".into());
        }
        self.defaults
            .validate()
            .map_err(|e| format!("defaults invalid: {e}"))?;
        for (name, spec) in &self.queues {
            if name.is_empty() {
                return Err("queue names must not be empty".into());
            }
            if let Some(cfg) = &spec.config {
                cfg.validate()
                    .map_err(|e| format!("queue `{name}` invalid: {e}"))?;
            }
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
