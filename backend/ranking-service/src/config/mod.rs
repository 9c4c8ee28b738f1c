use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub redis: RedisConfig,
    pub sponsor: SponsorConfig,
    pub recompute: RecomputeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// `json` for structured output, anything else for plain text
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorConfig {
    #[serde(default = "default_num_sponsors")]
    pub default_num_sponsors: usize,
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: u64,
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecomputeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_redis_queue_key")]
    pub redis_queue_key: String,
}

fn default_service_name() -> String {
    "ranking-service".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_num_sponsors() -> usize {
    3
}

fn default_cache_minutes() -> u64 {
    10
}

fn default_cache_key_prefix() -> String {
    "sponsors".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_concurrency() -> usize {
    4
}

fn default_redis_queue_key() -> String {
    "ranking:recompute".to_string()
}

impl Default for SponsorConfig {
    fn default() -> Self {
        Self {
            default_num_sponsors: default_num_sponsors(),
            cache_minutes: default_cache_minutes(),
            cache_key_prefix: default_cache_key_prefix(),
        }
    }
}

impl SponsorConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_minutes.saturating_mul(60))
    }
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            concurrency: default_concurrency(),
            redis_queue_key: default_redis_queue_key(),
        }
    }
}

impl Config {
    /// Load from `RANKING_*` environment variables (and `.env` if present).
    ///
    /// - `RANKING_SERVICE_NAME`, `RANKING_LOG_FORMAT`
    /// - `RANKING_REDIS_URL`
    /// - `RANKING_SPONSOR_DEFAULT_NUM_SPONSORS`, `RANKING_SPONSOR_CACHE_MINUTES`, `RANKING_SPONSOR_CACHE_KEY_PREFIX`
    /// - `RANKING_RECOMPUTE_QUEUE_CAPACITY`, `RANKING_RECOMPUTE_CONCURRENCY`, `RANKING_RECOMPUTE_REDIS_QUEUE_KEY`
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Ok(Config {
            service: envy::prefixed("RANKING_").from_env()?,
            redis: envy::prefixed("RANKING_REDIS_").from_env()?,
            sponsor: envy::prefixed("RANKING_SPONSOR_").from_env()?,
            recompute: envy::prefixed("RANKING_RECOMPUTE_").from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sponsor_defaults() {
        let config = SponsorConfig::default();
        assert_eq!(config.default_num_sponsors, 3);
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache_key_prefix, "sponsors");
    }

    #[test]
    fn test_huge_cache_minutes_saturate() {
        let config = SponsorConfig {
            cache_minutes: u64::MAX,
            ..SponsorConfig::default()
        };
        assert_eq!(config.cache_ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_sections_parse_from_env_pairs() {
        let sponsor: SponsorConfig = envy::prefixed("RANKING_SPONSOR_")
            .from_iter(vec![
                ("RANKING_SPONSOR_DEFAULT_NUM_SPONSORS".to_string(), "5".to_string()),
                ("RANKING_SPONSOR_CACHE_MINUTES".to_string(), "2".to_string()),
            ])
            .unwrap();
        assert_eq!(sponsor.default_num_sponsors, 5);
        assert_eq!(sponsor.cache_ttl(), Duration::from_secs(120));
        assert_eq!(sponsor.cache_key_prefix, "sponsors");

        let recompute: RecomputeConfig = envy::prefixed("RANKING_RECOMPUTE_")
            .from_iter(vec![("RANKING_RECOMPUTE_CONCURRENCY".to_string(), "8".to_string())])
            .unwrap();
        assert_eq!(recompute.concurrency, 8);
        assert_eq!(recompute.queue_capacity, 1024);
        assert_eq!(recompute.redis_queue_key, "ranking:recompute");
    }

    #[test]
    fn test_service_section_defaults() {
        let service: ServiceConfig = envy::prefixed("RANKING_")
            .from_iter(Vec::<(String, String)>::new())
            .unwrap();
        assert_eq!(service.service_name, "ranking-service");
        assert_eq!(service.log_format, "text");
    }
}
