pub mod messages;

use anyhow::{anyhow, Result};
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub server_tag: String,
    pub daily_report_limit: u32,
    pub cooldown_minutes: u64,
    pub context_lines_shown: usize,
    pub page_size: u32,
    pub penalty_commands: Vec<String>,
    pub default_penalty_kind: String,
    pub categories: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_tag: "server".to_string(),
            daily_report_limit: 5,
            cooldown_minutes: 10,
            context_lines_shown: 5,
            page_size: 45,
            penalty_commands: Vec::new(),
            default_penalty_kind: "ban".to_string(),
            categories: default_categories(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        let categories = env_list("VIGIL_CATEGORIES");
        Ok(Self {
            server_tag: env_or("VIGIL_SERVER_TAG", "server"),
            daily_report_limit: env_or_parse("VIGIL_DAILY_REPORT_LIMIT", "5")?,
            cooldown_minutes: env_or_parse("VIGIL_COOLDOWN_MINUTES", "10")?,
            context_lines_shown: env_or_parse("VIGIL_CONTEXT_LINES", "5")?,
            page_size: env_or_parse("VIGIL_PAGE_SIZE", "45")?,
            penalty_commands: env_list("VIGIL_PENALTY_COMMANDS"),
            default_penalty_kind: env_or("VIGIL_PENALTY_KIND", "ban"),
            categories: if categories.is_empty() {
                default_categories()
            } else {
                categories
            },
        })
    }
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
        })
    }
}

fn default_categories() -> Vec<String> {
    ["Abuse", "Cheating", "Spam/Flood", "Advertising"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

/// Semicolon-separated list env var; absent or empty means an empty list.
fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|value| {
            value
                .split(';')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
