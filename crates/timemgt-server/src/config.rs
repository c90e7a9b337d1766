use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

/// JWT secrets that must never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    Jwt { secret: String },
    Session { redis_url: String, key_prefix: String },
    Remote { user_center_url: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub db_timeout: Duration,
    pub shutdown_grace: Duration,
    pub auth: AuthStrategy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let host = or("TIMEMGT_HOST", "0.0.0.0");
        let port: u16 = or("TIMEMGT_PORT", "8050")
            .parse()
            .context("TIMEMGT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let secs = |key: &str, default: &str| -> anyhow::Result<Duration> {
            let n: u64 = or(key, default)
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", key))?;
            Ok(Duration::from_secs(n))
        };

        let auth = match or("TIMEMGT_AUTH_STRATEGY", "jwt").to_lowercase().as_str() {
            "jwt" => {
                let secret = var("TIMEMGT_JWT_SECRET").unwrap_or_default();
                if secret.is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
                    bail!("TIMEMGT_JWT_SECRET is unset or still a placeholder");
                }
                AuthStrategy::Jwt { secret }
            }
            "session" => AuthStrategy::Session {
                redis_url: or("TIMEMGT_REDIS_URL", "redis://127.0.0.1:6379"),
                key_prefix: lookup("TIMEMGT_SESSION_PREFIX").unwrap_or_default(),
            },
            "remote" => AuthStrategy::Remote {
                user_center_url: var("TIMEMGT_USER_CENTER_URL")
                    .context("TIMEMGT_USER_CENTER_URL is required for the remote strategy")?,
            },
            other => bail!("unknown TIMEMGT_AUTH_STRATEGY '{}' (jwt, session or remote)", other),
        };

        Ok(Self {
            addr,
            db_path: or("TIMEMGT_DB_PATH", "timemgt.db").into(),
            db_timeout: secs("TIMEMGT_DB_TIMEOUT_SECS", "5")?,
            shutdown_grace: secs("TIMEMGT_SHUTDOWN_GRACE_SECS", "60")?,
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_with_jwt_secret() {
        let cfg = config(&[("TIMEMGT_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:8050".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("timemgt.db"));
        assert_eq!(cfg.db_timeout, Duration::from_secs(5));
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(60));
        assert_eq!(
            cfg.auth,
            AuthStrategy::Jwt {
                secret: "a-real-secret".into()
            }
        );
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(config(&[]).is_err());
        assert!(config(&[("TIMEMGT_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn session_and_remote_strategies() {
        let cfg = config(&[
            ("TIMEMGT_AUTH_STRATEGY", "session"),
            ("TIMEMGT_SESSION_PREFIX", "sess:"),
        ])
        .unwrap();
        assert_eq!(
            cfg.auth,
            AuthStrategy::Session {
                redis_url: "redis://127.0.0.1:6379".into(),
                key_prefix: "sess:".into()
            }
        );

        assert!(config(&[("TIMEMGT_AUTH_STRATEGY", "remote")]).is_err());
        let cfg = config(&[
            ("TIMEMGT_AUTH_STRATEGY", "remote"),
            ("TIMEMGT_USER_CENTER_URL", "http://users:8040"),
        ])
        .unwrap();
        assert!(matches!(cfg.auth, AuthStrategy::Remote { .. }));
    }

    #[test]
    fn bad_numbers_fail_startup() {
        assert!(config(&[("TIMEMGT_JWT_SECRET", "s3cr3t!"), ("TIMEMGT_PORT", "http")]).is_err());
        assert!(config(&[("TIMEMGT_AUTH_STRATEGY", "ldap")]).is_err());
    }
}
