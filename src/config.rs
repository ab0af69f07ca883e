//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::store::RetryPolicy;

/// Runtime configuration for the quiz server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server binds to
    pub bind_addr: SocketAddr,
    /// Buffered events per session feed before slow subscribers lag
    pub notify_capacity: usize,
    /// How often a follower re-fetches while its change feed is unavailable
    pub poll_interval: Duration,
    /// Backoff for transient store failures
    pub retry: RetryPolicy,
    /// Optional question set file; a session is opened for it at startup
    pub demo_questions: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7878)),
            notify_capacity: 64,
            poll_interval: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            demo_questions: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}", key, trimmed);
            None
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults:
    /// - LIVEQUIZ_BIND: socket address (default 0.0.0.0:7878)
    /// - LIVEQUIZ_NOTIFY_CAPACITY: per-session event buffer (default 64)
    /// - LIVEQUIZ_POLL_INTERVAL_MS: fallback polling interval (default 2000)
    /// - LIVEQUIZ_STORE_RETRIES: attempts for transient store errors (default 4)
    /// - LIVEQUIZ_DEMO_QUESTIONS: path to a question set JSON file
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let retry = RetryPolicy {
            max_attempts: env_parse::<u32>("LIVEQUIZ_STORE_RETRIES")
                .unwrap_or(defaults.retry.max_attempts)
                .max(1),
            ..defaults.retry
        };

        Self {
            bind_addr: env_parse("LIVEQUIZ_BIND").unwrap_or(defaults.bind_addr),
            notify_capacity: env_parse("LIVEQUIZ_NOTIFY_CAPACITY")
                .unwrap_or(defaults.notify_capacity),
            poll_interval: env_parse::<u64>("LIVEQUIZ_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            retry,
            demo_questions: std::env::var("LIVEQUIZ_DEMO_QUESTIONS")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}
