use std::path::PathBuf;
use std::time::Duration;

/// Polling budget for the feedback poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status checks
    pub interval: Duration,
    /// Checks performed before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

    /// Shortest accepted interval; a zero period cannot drive a ticker.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Longest a poll can run before timing out, ignoring request latency.
    pub fn worst_case(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,
    /// Transport timeout applied to every request
    pub request_timeout: Duration,
    pub poll: PollPolicy,
    /// Where the auth cache persists the session; in-memory when unset
    pub session_file: Option<PathBuf>,
    pub app_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            request_timeout: Duration::from_secs(10),
            poll: PollPolicy::default(),
            session_file: None,
            app_name: "Mentor de Redação".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let api_base_url = lookup("MENTOR_API_BASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_base_url);
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            anyhow::bail!("Invalid MENTOR_API_BASE_URL '{api_base_url}'. Expected an http(s) URL");
        }

        let timeout_ms = parse_var(&lookup, "MENTOR_API_TIMEOUT_MS", 10_000u64)?;
        let interval_ms = parse_var(
            &lookup,
            "MENTOR_POLL_INTERVAL_MS",
            PollPolicy::DEFAULT_INTERVAL.as_millis() as u64,
        )?;
        if interval_ms == 0 {
            anyhow::bail!("MENTOR_POLL_INTERVAL_MS must be at least 1");
        }
        let max_attempts = parse_var(
            &lookup,
            "MENTOR_POLL_MAX_ATTEMPTS",
            PollPolicy::DEFAULT_MAX_ATTEMPTS,
        )?;
        if max_attempts == 0 {
            anyhow::bail!("MENTOR_POLL_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(timeout_ms),
            poll: PollPolicy::new(Duration::from_millis(interval_ms), max_attempts),
            session_file: lookup("MENTOR_SESSION_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            app_name: lookup("MENTOR_APP_NAME").unwrap_or(defaults.app_name),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        None => Ok(default),
    }
}
