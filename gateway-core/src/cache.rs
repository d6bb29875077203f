//! Short-TTL memoization of read-only verb results, keyed by method name and
//! arguments. Mutating calls (`is_mutating()`) are never offered to the
//! cache by the manager, so this module does not need to know about them.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gateway_common::config::{CacheBackendKind, CacheConfig, RedisConfig};
use gateway_common::error::GatewayError;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(pub String);

impl CacheKey {
    pub fn new(method_name: &str, args_fingerprint: &str) -> Self {
        CacheKey(format!("{method_name}:{args_fingerprint}"))
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Value>;
    async fn put(&self, key: CacheKey, value: Value, ttl: Duration);
}

/// No caching at all; every lookup misses and every write is discarded.
pub struct DisabledCache;

#[async_trait]
impl Cache for DisabledCache {
    async fn get(&self, _key: &CacheKey) -> Option<Value> {
        None
    }

    async fn put(&self, _key: CacheKey, _value: Value, _ttl: Duration) {}
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process TTL cache. Entries past their TTL are treated as absent on
/// read and lazily swept on write; there is no background eviction task.
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        MemoryCache { entries: Mutex::new(HashMap::new()), max_entries }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            _ => None,
        }
    }

    async fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            // No LRU bookkeeping: under sustained over-capacity pressure we
            // simply stop admitting new keys until something expires.
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                return;
            }
        }
        entries.insert(key, Entry { value, expires_at: Instant::now() + ttl });
    }
}

/// Shared-cache backend for gateways running behind a load balancer, where
/// an in-process `MemoryCache` would leave every instance with its own cold
/// cache. Connects lazily: `RedisCache::new` only parses the endpoint, a
/// connection is opened (and re-opened on failure) per call.
pub struct RedisCache {
    client: redis::Client,
    timeout: Duration,
}

impl RedisCache {
    pub fn new(config: &RedisConfig) -> Result<Self, GatewayError> {
        let url = format!("redis://{}:{}", config.endpoint, config.port);
        let client = redis::Client::open(url)
            .map_err(|err| GatewayError::Validation(format!("invalid redis endpoint: {err}")))?;
        Ok(RedisCache { client, timeout: config.timeout })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        let result = tokio::time::timeout(self.timeout, async {
            let mut conn = self.client.get_multiplexed_tokio_connection().await?;
            let raw: Option<String> = redis::cmd("GET").arg(&key.0).query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(raw)
        })
        .await;
        match result {
            Ok(Ok(raw)) => raw.and_then(|raw| serde_json::from_str(&raw).ok()),
            Ok(Err(err)) => {
                warn!(%err, "redis cache read failed");
                None
            }
            Err(_) => {
                warn!("redis cache read timed out");
                None
            }
        }
    }

    async fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        let Ok(serialized) = serde_json::to_string(&value) else {
            return;
        };
        let ttl_secs = ttl.as_secs().max(1);
        let result = tokio::time::timeout(self.timeout, async {
            let mut conn = self.client.get_multiplexed_tokio_connection().await?;
            let _: () = redis::cmd("SET")
                .arg(&key.0)
                .arg(serialized)
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(%err, "redis cache write failed"),
            Err(_) => warn!("redis cache write timed out"),
        }
    }
}

/// Builds the configured cache backend.
pub fn build_cache(config: &CacheConfig) -> Result<Box<dyn Cache>, GatewayError> {
    if !config.enabled {
        return Ok(Box::new(DisabledCache));
    }
    match config.backend {
        CacheBackendKind::Disabled => Ok(Box::new(DisabledCache)),
        CacheBackendKind::Memory => Ok(Box::new(MemoryCache::new(config.memory.max_entries))),
        CacheBackendKind::Redis => Ok(Box::new(RedisCache::new(&config.redis)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test_r::test]
    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("get_masterchain_info", "");
        cache.put(key.clone(), json!({"seqno": 1}), Duration::from_millis(20)).await;
        assert!(cache.get(&key).await.is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[test_r::test]
    #[tokio::test]
    async fn disabled_cache_never_remembers_anything() {
        let cache = DisabledCache;
        let key = CacheKey::new("get_masterchain_info", "");
        cache.put(key.clone(), json!({"seqno": 1}), Duration::from_secs(60)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn redis_backend_builds_without_connecting_eagerly() {
        let config = CacheConfig {
            enabled: true,
            backend: CacheBackendKind::Redis,
            memory: gateway_common::config::MemoryCacheConfig { max_entries: 10 },
            redis: gateway_common::config::RedisConfig {
                endpoint: "localhost".to_string(),
                port: 6379,
                timeout: Duration::from_secs(1),
            },
        };
        // `RedisCache::new` only parses the connection URL; no socket is
        // opened until the first `get`/`put`, so this succeeds even without
        // a reachable redis server.
        assert!(build_cache(&config).is_ok());
    }

    #[test]
    fn redis_backend_rejects_an_unparseable_endpoint() {
        let config = CacheConfig {
            enabled: true,
            backend: CacheBackendKind::Redis,
            memory: gateway_common::config::MemoryCacheConfig { max_entries: 10 },
            redis: gateway_common::config::RedisConfig {
                endpoint: "invalid host with spaces".to_string(),
                port: 6379,
                timeout: Duration::from_secs(1),
            },
        };
        assert!(build_cache(&config).is_err());
    }
}
