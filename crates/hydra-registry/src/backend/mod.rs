//! Registry store backends

pub mod memory;
pub mod redis;

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

/// Trait for registry storage backends
///
/// The command set mirrors what the registry layout needs: hashes for nodes
/// and configs, sets for routes, lists for health logs and queues, plain
/// strings for registrations and health snapshots.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Round-trip check
    async fn ping(&self) -> Result<()>;

    /// Keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// String value of a key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every field of a hash
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;

    /// One field of a hash
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Set one field of a hash
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Remove fields of a hash in one command, returning how many existed
    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64>;

    /// Members of a set
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// `LRANGE start stop` over several lists in one atomic transaction
    async fn lrange_atomic(&self, keys: &[String], start: isize, stop: isize)
    -> Result<Vec<Vec<String>>>;

    /// Publish on a channel, returning the number of receivers
    async fn publish(&self, channel: &str, message: &str) -> Result<u64>;

    /// Push onto the head of a list
    async fn lpush(&self, key: &str, value: &str) -> Result<()>;

    /// Server `INFO` report
    async fn info(&self) -> Result<String>;

    /// Release the underlying connections; safe to call twice
    async fn close(&self);
}

/// Shared backends, so a caller can keep a handle on what it hands over
#[async_trait]
impl<T: RegistryBackend + ?Sized> RegistryBackend for Arc<T> {
    async fn ping(&self) -> Result<()> {
        (**self).ping().await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        (**self).keys(pattern).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        (**self).hgetall(key).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        (**self).hget(key, field).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        (**self).hset(key, field, value).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        (**self).hdel(key, fields).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        (**self).smembers(key).await
    }

    async fn lrange_atomic(
        &self,
        keys: &[String],
        start: isize,
        stop: isize,
    ) -> Result<Vec<Vec<String>>> {
        (**self).lrange_atomic(keys, start, stop).await
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        (**self).publish(channel, message).await
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        (**self).lpush(key, value).await
    }

    async fn info(&self) -> Result<String> {
        (**self).info().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
