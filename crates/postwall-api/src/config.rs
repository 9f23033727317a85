//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::error::AppError;

/// Runtime settings for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Redis server holding the event streams.
    pub redis_url: String,
    /// Broker topic carrying post events.
    pub event_topic: String,
    /// Number of partitions on the event topic.
    pub broker_partitions: NonZeroUsize,
    /// Consumer group the read side commits offsets under.
    pub consumer_group: String,
    /// This process's name within the consumer group. Keep it stable across
    /// restarts so unacknowledged entries are picked up again.
    pub consumer_name: String,
    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, applying defaults for
    /// unset optional keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".to_owned())
        })?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000)?;
        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_owned());
        let event_topic = lookup("EVENT_TOPIC").unwrap_or_else(|| "post-events".to_owned());
        let partitions: usize = parse_or(&lookup, "BROKER_PARTITIONS", 4)?;
        let broker_partitions = NonZeroUsize::new(partitions).ok_or_else(|| {
            AppError::Config("BROKER_PARTITIONS must be at least 1".to_owned())
        })?;
        let consumer_group = lookup("CONSUMER_GROUP").unwrap_or_else(|| "post-query".to_owned());
        let consumer_name = lookup("CONSUMER_NAME").unwrap_or_else(|| "postwall-api".to_owned());
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?;

        Ok(Self {
            database_url,
            host,
            port,
            redis_url,
            event_topic,
            broker_partitions,
            consumer_group,
            consumer_name,
            db_max_connections,
        })
    }

    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `host:port` is not a valid address.
    pub fn listen_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Act
        let config =
            AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://db/posts")]))
                .unwrap();

        // Assert
        assert_eq!(config.database_url, "postgres://db/posts");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.event_topic, "post-events");
        assert_eq!(config.broker_partitions.get(), 4);
        assert_eq!(config.consumer_group, "post-query");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.consumer_name, "postwall-api");
        assert_eq!(config.db_max_connections, 10);
    }

    #[test]
    fn test_overrides_are_read() {
        // Act
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/posts"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("EVENT_TOPIC", "social"),
            ("BROKER_PARTITIONS", "8"),
            ("CONSUMER_GROUP", "lookup"),
            ("CONSUMER_NAME", "lookup-2"),
            ("REDIS_URL", "redis://cache:6380"),
            ("DB_MAX_CONNECTIONS", "3"),
        ]))
        .unwrap();

        // Assert
        assert_eq!(config.port, 8080);
        assert_eq!(config.event_topic, "social");
        assert_eq!(config.broker_partitions.get(), 8);
        assert_eq!(config.consumer_group, "lookup");
        assert_eq!(config.consumer_name, "lookup-2");
        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.db_max_connections, 3);
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup_from(&[]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/posts"),
            ("PORT", "eighty"),
        ]));

        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("PORT")));
    }

    #[test]
    fn test_zero_partitions_is_a_config_error() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/posts"),
            ("BROKER_PARTITIONS", "0"),
        ]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
