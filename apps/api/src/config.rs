use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::matching::batch::BatchOptions;
use crate::matching::policy::ScoringPolicy;
use crate::mcp::context::ContextOptions;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Shared session store. Unset means an in-process store.
    pub redis_url: Option<String>,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub loop_settings: LoopSettings,
}

/// Tunables for the MCP loop and the scorers it drives.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub retry_ceiling: u32,
    pub cache_ttl: Duration,
    /// Upper bound on every outbound LLM call and store round trip.
    pub call_timeout: Duration,
    pub match_limit: usize,
    pub match_threshold: f64,
    /// Open roles considered in candidate mode.
    pub open_role_pool: usize,
    pub batch: BatchOptions,
    pub context: ContextOptions,
    pub policy: ScoringPolicy,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            retry_ceiling: 2,
            cache_ttl: Duration::from_secs(24 * 3600),
            call_timeout: Duration::from_secs(20),
            match_limit: 10,
            match_threshold: 0.5,
            open_role_pool: 50,
            batch: BatchOptions::default(),
            context: ContextOptions::default(),
            policy: ScoringPolicy::default(),
        }
    }
}

impl LoopSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let ttl_hours: u64 = parse_or("MCP_CACHE_TTL_HOURS", env("MCP_CACHE_TTL_HOURS"), 24)?;
        let timeout_secs: u64 =
            parse_or("MCP_CALL_TIMEOUT_SECS", env("MCP_CALL_TIMEOUT_SECS"), 20)?;

        Ok(Self {
            retry_ceiling: parse_or(
                "MCP_RETRY_CEILING",
                env("MCP_RETRY_CEILING"),
                defaults.retry_ceiling,
            )?,
            cache_ttl: Duration::from_secs(ttl_hours * 3600),
            call_timeout: Duration::from_secs(timeout_secs.max(1)),
            match_limit: parse_or("MCP_MATCH_LIMIT", env("MCP_MATCH_LIMIT"), defaults.match_limit)?,
            match_threshold: parse_or(
                "MCP_MATCH_THRESHOLD",
                env("MCP_MATCH_THRESHOLD"),
                defaults.match_threshold,
            )?,
            batch: BatchOptions {
                max_concurrent: parse_or(
                    "MCP_BATCH_MAX_CONCURRENT",
                    env("MCP_BATCH_MAX_CONCURRENT"),
                    defaults.batch.max_concurrent,
                )?
                .max(1),
                max_candidates: parse_or(
                    "MCP_BATCH_MAX_CANDIDATES",
                    env("MCP_BATCH_MAX_CANDIDATES"),
                    defaults.batch.max_candidates,
                )?,
                ..defaults.batch
            },
            ..defaults
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: env("REDIS_URL").filter(|url| !url.trim().is_empty()),
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            loop_settings: LoopSettings::from_env()?,
        })
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{value}'")),
        _ => Ok(default),
    }
}
