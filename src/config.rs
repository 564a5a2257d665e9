// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

/// Upper bound for a single submitted answer, in characters.
pub const MAX_ANSWER_LENGTH: u64 = 4000;

/// Whether the exam's `start_at`/`end_at` window gates the creation of new sessions.
///
/// `Ignore` is the long-standing behavior: any existing exam can be started at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExamWindowPolicy {
    #[default]
    Ignore,
    Enforce,
}

impl FromStr for ExamWindowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!("unknown exam window policy '{}'", other)),
        }
    }
}

/// Bounded retry applied around store calls that fail transiently.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// No retries at all. Used by tests that want failures surfaced immediately.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub rust_log: String,
    pub exam_window: ExamWindowPolicy,
    pub store_retry: RetryPolicy,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let database_max_connections = env_or("DATABASE_MAX_CONNECTIONS", 5);

        let exam_window = env_or("EXAM_WINDOW_POLICY", ExamWindowPolicy::default());

        let defaults = RetryPolicy::default();
        let store_retry = RetryPolicy {
            max_retries: env_or("STORE_MAX_RETRIES", defaults.max_retries),
            base_delay: Duration::from_millis(env_or(
                "STORE_RETRY_BASE_MS",
                defaults.base_delay.as_millis() as u64,
            )),
        };

        Self {
            database_url,
            database_max_connections,
            jwt_secret,
            rust_log,
            exam_window,
            store_retry,
        }
    }
}

/// Optional variable: the default when unset, a panic when set but malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    parse_var(key, env::var(key).ok(), default)
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} has an invalid value: '{}'", key, raw)),
        None => default,
    }
}
