//! Layered configuration: built-in defaults, then an optional TOML file,
//! then environment overrides (`EVENTS__SECTION__KEY`), the same
//! precedence order the `config` crate is built around.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub key_prefix: String,
    pub ttl_hours: u64,
    pub current_month_ttl_hours: u64,
    pub long_term_ttl_hours: u64,
    pub enable_tiered_ttl: bool,
    pub max_months_per_query: usize,
    pub redis_url: String,
    pub fill_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub wait_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    pub window: usize,
    pub threshold_pct: u8,
    pub min_calls: usize,
    pub open_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub store: StoreConfig,
}

impl CacheConfig {
    pub fn ttl_for_age(&self, age_months: i32) -> Duration {
        if !self.enable_tiered_ttl {
            return Duration::from_secs(self.ttl_hours * 3600);
        }
        let hours = if age_months <= 0 {
            self.current_month_ttl_hours
        } else if age_months <= 3 {
            self.ttl_hours
        } else {
            self.long_term_ttl_hours
        };
        Duration::from_secs(hours * 3600)
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl BreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_millis(self.open_ms)
    }
}

impl AppConfig {
    /// Loads defaults, overlays an optional file at `path`, then environment
    /// variables prefixed `EVENTS__` with `__` as the section separator.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.metrics_port", 9090)?
            .set_default("sync.enabled", true)?
            .set_default("sync.interval_ms", 30_000i64)?
            .set_default("cache.key_prefix", "fever:events:month:")?
            .set_default("cache.ttl_hours", 6i64)?
            .set_default("cache.current_month_ttl_hours", 2i64)?
            .set_default("cache.long_term_ttl_hours", 168i64)?
            .set_default("cache.enable_tiered_ttl", true)?
            .set_default("cache.max_months_per_query", 24i64)?
            .set_default("cache.redis_url", "redis://127.0.0.1:6379")?
            .set_default("cache.fill_queue_capacity", 256i64)?
            .set_default("provider.base_url", "https://provider.example.com")?
            .set_default("provider.timeout_ms", 10_000i64)?
            .set_default("provider.retry.max_attempts", 3i64)?
            .set_default("provider.retry.wait_ms", 2_000i64)?
            .set_default("provider.retry.multiplier", 2.0)?
            .set_default("provider.breaker.window", 10i64)?
            .set_default("provider.breaker.threshold_pct", 50i64)?
            .set_default("provider.breaker.min_calls", 5i64)?
            .set_default("provider.breaker.open_ms", 30_000i64)?
            .set_default(
                "store.database_url",
                "postgres://localhost/events_marketplace",
            )?
            .set_default("store.max_connections", 20i64)?
            .set_default("store.min_connections", 5i64)?
            .set_default("store.acquire_timeout_secs", 30i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("EVENTS")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `AppConfig::load` reads process-wide env vars; serialize the tests
    // that set them so they don't observe each other's overrides.
    static ENV_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_load_without_a_file() {
        let _guard = ENV_GUARD.lock().unwrap();
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.cache.key_prefix, "fever:events:month:");
        assert!(cfg.sync.enabled);
    }

    #[test]
    fn tiered_ttl_matches_age_bands() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg.cache.ttl_for_age(0), Duration::from_secs(2 * 3600));
        assert_eq!(cfg.cache.ttl_for_age(2), Duration::from_secs(6 * 3600));
        assert_eq!(cfg.cache.ttl_for_age(4), Duration::from_secs(168 * 3600));
    }

    #[test]
    fn env_override_wins_over_default() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("EVENTS__SERVER__PORT", "9999");
        let cfg = AppConfig::load(None).unwrap();
        std::env::remove_var("EVENTS__SERVER__PORT");
        assert_eq!(cfg.server.port, 9999);
    }

    #[test]
    fn file_layer_overrides_defaults_but_not_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");
        std::fs::write(
            &file_path,
            r#"
            [server]
            port = 7000

            [cache]
            key_prefix = "custom:prefix:"
            "#,
        )
        .unwrap();

        std::env::set_var("EVENTS__CACHE__TTL_HOURS", "9");
        let cfg = AppConfig::load(Some(file_path.with_extension("").to_str().unwrap())).unwrap();
        std::env::remove_var("EVENTS__CACHE__TTL_HOURS");

        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.cache.key_prefix, "custom:prefix:");
        assert_eq!(cfg.cache.ttl_hours, 9);
    }
}
