//! Configuration module for ShareSpace.
//!
//! All configuration is loaded from environment variables (and an optional
//! `.env` file) with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::backend::{KindnessPolicy, LocalSettings};
use crate::errors::AppError;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Lifetime of issued bearer tokens
    pub token_ttl_hours: i64,
    /// Blocked comment phrases; `None` keeps the built-in list
    pub moderation_terms: Option<Vec<String>>,
    pub kindness_policy: KindnessPolicy,
    /// Insert the welcome posts into an empty feed
    pub seed_posts: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let db_path: PathBuf = env::var("SHARESPACE_DB_PATH")
            .unwrap_or_else(|_| "./data/sharespace.sqlite".to_string())
            .into();

        let bind_addr: SocketAddr = env::var("SHARESPACE_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| invalid("SHARESPACE_BIND_ADDR", e))?;

        let log_level = env::var("SHARESPACE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let token_ttl_hours: i64 = match env::var("SHARESPACE_TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| invalid("SHARESPACE_TOKEN_TTL_HOURS", e))?,
            Err(_) => 168,
        };

        let moderation_terms: Option<Vec<String>> = env::var("SHARESPACE_MODERATION_TERMS")
            .ok()
            .map(|raw| raw.split(',').map(|t| t.trim().to_string()).collect());

        let kindness_policy: KindnessPolicy = match env::var("SHARESPACE_KINDNESS_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => KindnessPolicy::default(),
        };

        let seed_posts = match env::var("SHARESPACE_SEED_POSTS") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| invalid("SHARESPACE_SEED_POSTS", raw))?,
            Err(_) => true,
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            token_ttl_hours,
            moderation_terms,
            kindness_policy,
            seed_posts,
        })
    }

    /// Settings for the store-backed service.
    pub fn local_settings(&self) -> LocalSettings {
        LocalSettings {
            moderation_terms: self.moderation_terms.clone(),
            kindness_policy: self.kindness_policy,
            token_ttl_hours: self.token_ttl_hours,
        }
    }
}

/// Where a client keeps its feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Everything in the client's own store
    Local,
    /// Feed and authentication through a ShareSpace server
    Remote { base_url: String },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend: BackendKind,
    /// Client store: session token, journal, profiles (and the feed when local)
    pub data_path: PathBuf,
    pub local: LocalSettings,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let backend = match env::var("SHARESPACE_API_URL") {
            Ok(url) if !url.trim().is_empty() => BackendKind::Remote {
                base_url: url.trim().to_string(),
            },
            _ => BackendKind::Local,
        };

        let data_path: PathBuf = env::var("SHARESPACE_CLIENT_DB_PATH")
            .unwrap_or_else(|_| "./data/client.sqlite".to_string())
            .into();

        Ok(Self {
            backend,
            data_path,
            local: LocalSettings::default(),
        })
    }

    pub fn local(data_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Local,
            data_path: data_path.into(),
            local: LocalSettings::default(),
        }
    }

    pub fn remote(base_url: impl Into<String>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Remote {
                base_url: base_url.into(),
            },
            data_path: data_path.into(),
            local: LocalSettings::default(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(var: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid {}: {}", var, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 9] = [
        "SHARESPACE_DB_PATH",
        "SHARESPACE_BIND_ADDR",
        "SHARESPACE_LOG_LEVEL",
        "SHARESPACE_TOKEN_TTL_HOURS",
        "SHARESPACE_MODERATION_TERMS",
        "SHARESPACE_KINDNESS_POLICY",
        "SHARESPACE_SEED_POSTS",
        "SHARESPACE_API_URL",
        "SHARESPACE_CLIENT_DB_PATH",
    ];

    // Environment is process-global, so every case lives in one test.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/sharespace.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.token_ttl_hours, 168);
        assert!(config.moderation_terms.is_none());
        assert_eq!(config.kindness_policy, KindnessPolicy::Unlimited);
        assert!(config.seed_posts);

        let client = ClientConfig::from_env().unwrap();
        assert_eq!(client.backend, BackendKind::Local);
        assert_eq!(client.data_path, PathBuf::from("./data/client.sqlite"));

        env::set_var("SHARESPACE_MODERATION_TERMS", "mean, rude");
        env::set_var("SHARESPACE_KINDNESS_POLICY", "once-per-user");
        env::set_var("SHARESPACE_SEED_POSTS", "no");
        env::set_var("SHARESPACE_API_URL", "http://127.0.0.1:9000");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.moderation_terms,
            Some(vec!["mean".to_string(), "rude".to_string()])
        );
        assert_eq!(config.kindness_policy, KindnessPolicy::OncePerUser);
        assert!(!config.seed_posts);
        assert_eq!(
            ClientConfig::from_env().unwrap().backend,
            BackendKind::Remote {
                base_url: "http://127.0.0.1:9000".to_string()
            }
        );

        env::set_var("SHARESPACE_BIND_ADDR", "not-an-address");
        assert!(matches!(Config::from_env(), Err(AppError::Validation(_))));

        for var in VARS {
            env::remove_var(var);
        }
    }
}
