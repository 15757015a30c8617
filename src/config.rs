//! Engine configuration loaded from environment variables
//!
//! Every setting has a fallback. A value that fails to parse is reported
//! with a warning and replaced by its default, so a typo never keeps the
//! engine from starting.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::sandbox::SandboxConfig;
use crate::store::DEFAULT_SUBSCRIBER_BUFFER;

pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub listen_addr: SocketAddr,
    pub workers: usize,
    pub queue_capacity: usize,
    pub subscriber_buffer: usize,
    /// Replaces the embedded language table when set
    pub languages_path: Option<PathBuf>,
    pub sandbox: SandboxConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            languages_path: None,
            sandbox: SandboxConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut sandbox = defaults.sandbox;
        if let Some(bin) = get("JUDGE_DOCKER_BIN") {
            sandbox.docker_bin = bin;
        }
        sandbox.workspace_root = get("JUDGE_WORKSPACE_ROOT").map(PathBuf::from);

        Self {
            listen_addr: parse_or("JUDGE_LISTEN_ADDR", get("JUDGE_LISTEN_ADDR"), defaults.listen_addr),
            workers: at_least_one("JUDGE_WORKERS", get("JUDGE_WORKERS"), defaults.workers),
            queue_capacity: at_least_one(
                "JUDGE_QUEUE_CAPACITY",
                get("JUDGE_QUEUE_CAPACITY"),
                defaults.queue_capacity,
            ),
            subscriber_buffer: at_least_one(
                "JUDGE_SUBSCRIBER_BUFFER",
                get("JUDGE_SUBSCRIBER_BUFFER"),
                defaults.subscriber_buffer,
            ),
            languages_path: get("JUDGE_LANGUAGES_CONFIG").map(PathBuf::from),
            sandbox,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn parse_or<T>(key: &str, raw: Option<String>, fallback: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        None => fallback,
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {}={:?} ({}), using {}", key, raw, e, fallback);
            fallback
        }),
    }
}

fn at_least_one(key: &str, raw: Option<String>, fallback: usize) -> usize {
    let value = parse_or(key, raw, fallback);
    if value == 0 {
        warn!("{} must be at least 1, using {}", key, fallback);
        return fallback;
    }
    value
}
