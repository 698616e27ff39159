use std::{str::FromStr, time::Duration};

use crate::models::AppError;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Hostname, IPv4 or IPv6 literal; IPv6 may be bracketed.
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Host/port pair for `TcpListener::bind`, which resolves names.
    pub fn bind_target(&self) -> (&str, u16) {
        let host = self.host.trim();
        let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
        (host, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// Unset selects the in-memory user repository.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Deadline for a single user lookup.
    pub lookup_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 8080u16)?;
        let url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32)?;
        let acquire_ms = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_MS", 3000u64)?;
        let lookup_ms = parse_or(&lookup, "LOOKUP_TIMEOUT_MS", 2000u64)?;
        if lookup_ms == 0 {
            return Err(AppError::Validation("LOOKUP_TIMEOUT_MS must be greater than zero".into()));
        }
        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url,
                max_connections,
                acquire_timeout: Duration::from_millis(acquire_ms),
            },
            lookup_timeout: Duration::from_millis(lookup_ms),
        })
    }
}

/// Missing keys fall back to `default`; present but malformed values are an error.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Validation(format!("{key} has invalid value {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AppError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.url, None);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.database.acquire_timeout, Duration::from_millis(3000));
        assert_eq!(cfg.lookup_timeout, Duration::from_millis(2000));
    }

    #[test]
    fn overrides_are_read() {
        let cfg = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://u:p@db/app"),
            ("LOOKUP_TIMEOUT_MS", "250"),
        ])
        .unwrap();
        assert_eq!(cfg.server.bind_target(), ("127.0.0.1", 9000));
        assert_eq!(cfg.database.url.as_deref(), Some("postgres://u:p@db/app"));
        assert_eq!(cfg.lookup_timeout, Duration::from_millis(250));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let cfg = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert_eq!(cfg.database.url, None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(config_from(&[("PORT", "eighty")]), Err(AppError::Validation(_))));
        assert!(matches!(config_from(&[("LOOKUP_TIMEOUT_MS", "0")]), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn hostnames_and_ipv6_hosts_resolve() {
        for host in ["localhost", "::", "[::1]", "0.0.0.0"] {
            let cfg = config_from(&[("HOST", host), ("PORT", "0")]).unwrap();
            let addrs: Vec<_> = tokio::net::lookup_host(cfg.server.bind_target()).await.unwrap().collect();
            assert!(!addrs.is_empty(), "{host} resolved to nothing");
        }
    }

    #[test]
    fn brackets_are_stripped_from_ipv6_hosts() {
        let cfg = config_from(&[("HOST", "[::]"), ("PORT", "9000")]).unwrap();
        assert_eq!(cfg.server.bind_target(), ("::", 9000));
    }

    #[tokio::test]
    async fn localhost_binds() {
        let cfg = config_from(&[("HOST", "localhost"), ("PORT", "0")]).unwrap();
        let listener = tokio::net::TcpListener::bind(cfg.server.bind_target()).await.unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
