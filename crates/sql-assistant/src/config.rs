// sql-assistant/crates/sql-assistant/src/config.rs

use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::llm::LLMWorkerConfig;
use crate::query_engine::query_validator::{ValidationPolicy, DEFAULT_BLOCKED_KEYWORDS};

/// Every setting is read from a `CHATBOT_`-prefixed environment variable
pub const ENV_PREFIX: &str = "CHATBOT_";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub db_pool_size: u32,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub generate_timeout_seconds: u64,
    pub query_timeout_seconds: u64,
    pub max_result_rows: usize,
    pub max_query_length: usize,
    pub blocked_keywords: Vec<String>,
    pub max_history_per_session: usize,
    pub result_preview_rows: usize,
    pub enable_cache: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_size: u64,
    pub api_host: String,
    pub api_port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; `lookup` receives the full prefixed name
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str, default: &str| -> String {
            lookup(&format!("{}{}", ENV_PREFIX, name)).unwrap_or_else(|| default.to_string())
        };

        let llm_api_key = var("LLM_API_KEY", "");
        let blocked_keywords = parse_keyword_list(&var(
            "BLOCKED_KEYWORDS",
            &DEFAULT_BLOCKED_KEYWORDS.join(","),
        ));

        let config = Self {
            db_path: PathBuf::from(var("DB_PATH", "./data/app.db")),
            db_pool_size: parse_setting("DB_POOL_SIZE", &var("DB_POOL_SIZE", "10"))?,
            llm_base_url: var("LLM_BASE_URL", "http://127.0.0.1:8081"),
            llm_api_key: Some(llm_api_key.trim().to_string()).filter(|k| !k.is_empty()),
            llm_model: var("LLM_MODEL", "gpt-3.5-turbo"),
            llm_temperature: parse_setting("LLM_TEMPERATURE", &var("LLM_TEMPERATURE", "0.1"))?,
            llm_max_tokens: parse_setting("LLM_MAX_TOKENS", &var("LLM_MAX_TOKENS", "1000"))?,
            generate_timeout_seconds: parse_setting(
                "GENERATE_TIMEOUT_SECONDS",
                &var("GENERATE_TIMEOUT_SECONDS", "30"),
            )?,
            query_timeout_seconds: parse_setting(
                "QUERY_TIMEOUT_SECONDS",
                &var("QUERY_TIMEOUT_SECONDS", "30"),
            )?,
            max_result_rows: parse_setting("MAX_RESULT_ROWS", &var("MAX_RESULT_ROWS", "1000"))?,
            max_query_length: parse_setting("MAX_QUERY_LENGTH", &var("MAX_QUERY_LENGTH", "10000"))?,
            blocked_keywords,
            max_history_per_session: parse_setting(
                "MAX_HISTORY_PER_SESSION",
                &var("MAX_HISTORY_PER_SESSION", "10"),
            )?,
            result_preview_rows: parse_setting(
                "RESULT_PREVIEW_ROWS",
                &var("RESULT_PREVIEW_ROWS", "5"),
            )?,
            enable_cache: parse_setting("ENABLE_CACHE", &var("ENABLE_CACHE", "true"))?,
            cache_ttl_seconds: parse_setting("CACHE_TTL_SECONDS", &var("CACHE_TTL_SECONDS", "300"))?,
            cache_max_size: parse_setting("CACHE_MAX_SIZE", &var("CACHE_MAX_SIZE", "100"))?,
            api_host: var("API_HOST", "127.0.0.1"),
            api_port: parse_setting("API_PORT", &var("API_PORT", "8000"))?,
            log_level: var("LOG_LEVEL", "info"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Range checks; a violation is a startup error
    pub fn validate(&self) -> Result<()> {
        check_range("LLM_TEMPERATURE", self.llm_temperature, 0.0, 2.0)?;
        check_range("LLM_MAX_TOKENS", self.llm_max_tokens, 1, 4000)?;
        check_range("MAX_RESULT_ROWS", self.max_result_rows, 1, 10_000)?;
        check_range("MAX_QUERY_LENGTH", self.max_query_length, 1, 50_000)?;
        check_range("MAX_HISTORY_PER_SESSION", self.max_history_per_session, 1, usize::MAX)?;
        check_range("DB_POOL_SIZE", self.db_pool_size, 1, u32::MAX)?;
        check_range("GENERATE_TIMEOUT_SECONDS", self.generate_timeout_seconds, 1, u64::MAX)?;
        check_range("QUERY_TIMEOUT_SECONDS", self.query_timeout_seconds, 1, u64::MAX)?;
        Ok(())
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Database: {} (pool {})", self.db_path.display(), self.db_pool_size);
        info!("- LLM Backend: {}", self.llm_base_url);
        info!("- LLM Model: {} (temperature {}, max tokens {})", self.llm_model, self.llm_temperature, self.llm_max_tokens);
        info!("- LLM API Key: {}", if self.llm_api_key.is_some() { "set" } else { "not set" });
        info!("- Timeouts: generate {}s, query {}s", self.generate_timeout_seconds, self.query_timeout_seconds);
        info!("- Max Result Rows: {}", self.max_result_rows);
        info!("- Max Query Length: {}", self.max_query_length);
        info!("- Blocked Keywords: {}", self.blocked_keywords.join(", "));
        info!("- History Per Session: {}", self.max_history_per_session);
        info!("- Result Cache: {} (ttl {}s, max {})", self.enable_cache, self.cache_ttl_seconds, self.cache_max_size);
        info!("- API: {}:{}", self.api_host, self.api_port);
    }

    pub fn api_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.api_host, self.api_port)
            .parse()
            .with_context(|| format!("Invalid API address {}:{}", self.api_host, self.api_port))
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_seconds)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn llm_worker_config(&self) -> LLMWorkerConfig {
        LLMWorkerConfig {
            base_url: self.llm_base_url.clone(),
            api_key: self.llm_api_key.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            max_tokens: self.llm_max_tokens,
            timeout: self.generate_timeout(),
        }
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            max_query_length: self.max_query_length,
            blocked_keywords: self.blocked_keywords.clone(),
        }
    }
}

fn parse_setting<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {}{}: {:?}", ENV_PREFIX, name, raw))
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(anyhow::anyhow!(
            "{}{} must be between {} and {}, got {}",
            ENV_PREFIX,
            name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_ascii_uppercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Helper function to create a test Config with default values
    pub(crate) fn create_test_config() -> Config {
        Config {
            db_path: PathBuf::from("/test/app.db"),
            db_pool_size: 2,
            llm_base_url: "http://127.0.0.1:8081".to_string(),
            llm_api_key: None,
            llm_model: "test-model".to_string(),
            llm_temperature: 0.1,
            llm_max_tokens: 1000,
            generate_timeout_seconds: 30,
            query_timeout_seconds: 30,
            max_result_rows: 1000,
            max_query_length: 10_000,
            blocked_keywords: DEFAULT_BLOCKED_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_history_per_session: 5,
            result_preview_rows: 5,
            enable_cache: false,
            cache_ttl_seconds: 300,
            cache_max_size: 100,
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
            log_level: "info".to_string(),
        }
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{}{}", ENV_PREFIX, k), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = from_pairs(&[]).unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/app.db"));
        assert_eq!(config.db_pool_size, 10);
        assert_eq!(config.llm_model, "gpt-3.5-turbo");
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.max_result_rows, 1000);
        assert_eq!(config.max_query_length, 10_000);
        assert_eq!(config.max_history_per_session, 10);
        assert_eq!(config.blocked_keywords.len(), 7);
        assert!(config.enable_cache);
        assert_eq!(config.api_port, 8000);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = from_pairs(&[
            ("LLM_API_KEY", "sk-test"),
            ("MAX_HISTORY_PER_SESSION", "3"),
            ("BLOCKED_KEYWORDS", "drop, attach ,,pragma"),
            ("ENABLE_CACHE", "false"),
        ])
        .unwrap();

        assert_eq!(config.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.max_history_per_session, 3);
        assert_eq!(config.blocked_keywords, vec!["DROP", "ATTACH", "PRAGMA"]);
        assert!(!config.enable_cache);
    }

    #[test]
    fn test_blank_api_key_means_none() {
        let config = from_pairs(&[("LLM_API_KEY", "   ")]).unwrap();
        assert_eq!(config.llm_api_key, None);
    }

    #[test]
    fn test_unparsable_value_names_the_variable() {
        let err = from_pairs(&[("API_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("CHATBOT_API_PORT"));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(from_pairs(&[("LLM_TEMPERATURE", "2.5")]).is_err());
        assert!(from_pairs(&[("LLM_MAX_TOKENS", "0")]).is_err());
        assert!(from_pairs(&[("MAX_RESULT_ROWS", "10001")]).is_err());
        assert!(from_pairs(&[("MAX_QUERY_LENGTH", "50001")]).is_err());
        assert!(from_pairs(&[("MAX_HISTORY_PER_SESSION", "0")]).is_err());

        let err = from_pairs(&[("LLM_TEMPERATURE", "-1")]).unwrap_err();
        assert!(err.to_string().contains("between 0 and 2"));
    }

    #[test]
    fn test_api_addr_parsing() {
        let config = create_test_config();
        let addr = config.api_addr().unwrap();

        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_api_addr_with_bad_host() {
        let mut config = create_test_config();
        config.api_host = "not a host".to_string();
        assert!(config.api_addr().is_err());
    }

    #[test]
    fn test_llm_worker_config_follows_settings() {
        let mut config = create_test_config();
        config.llm_api_key = Some("key".to_string());
        config.generate_timeout_seconds = 12;

        let worker = config.llm_worker_config();
        assert_eq!(worker.model, "test-model");
        assert_eq!(worker.api_key.as_deref(), Some("key"));
        assert_eq!(worker.timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_validation_policy_follows_settings() {
        let config = create_test_config();
        let policy = config.validation_policy();
        assert_eq!(policy.max_query_length, 10_000);
        assert!(policy.blocked_keywords.contains(&"DROP".to_string()));
    }
}
