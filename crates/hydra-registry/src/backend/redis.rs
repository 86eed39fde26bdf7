//! Redis backend for the registry

use super::RegistryBackend;
use crate::error::{Error, Result};
use crate::profile::Profile;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use async_trait::async_trait;
use futures::lock::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// Redis-backed registry store
///
/// Holds one multiplexed primary connection. Administrative commands run on
/// a secondary connection that is opened and closed around the command.
pub struct RedisBackend {
    /// Client used to open connections
    client: Client,
    /// Primary connection, `None` once closed
    primary: Mutex<Option<MultiplexedConnection>>,
    /// Address for diagnostics
    addr: String,
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`
    pub async fn connect(profile: &Profile) -> Result<Self> {
        let addr = format!("{}:{}", profile.redis_url, profile.redis_port);
        let client = Client::open(connection_info(profile))
            .map_err(|e| Error::Connection(format!("{}: {}", addr, e)))?;

        debug!("Connecting to redis at {} db {}", addr, profile.redis_db);
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", addr, e)))?;

        let backend = Self {
            client,
            primary: Mutex::new(Some(conn)),
            addr,
        };
        if let Err(e) = backend.ping().await {
            return Err(Error::Connection(format!("{}: {}", backend.addr, e)));
        }

        info!("Connected to registry at {}", backend.addr);
        Ok(backend)
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.primary
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Connection(format!("connection to {} is closed", self.addr)))
    }
}

fn connection_info(profile: &Profile) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(profile.redis_url.clone(), profile.redis_port),
        redis: RedisConnectionInfo {
            db: profile.redis_db,
            password: profile.redis_password.clone(),
            ..Default::default()
        },
    }
}

#[async_trait]
impl RegistryBackend for RedisBackend {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.keys(pattern).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.get(key).await?)
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hgetall(key).await?)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.hget(key, field).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.hdel(key, fields.to_vec()).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        Ok(conn.smembers(key).await?)
    }

    async fn lrange_atomic(
        &self,
        keys: &[String],
        start: isize,
        stop: isize,
    ) -> Result<Vec<Vec<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.lrange(key, start, stop);
        }

        let mut conn = self.conn().await?;
        Ok(pipe.query_async(&mut conn).await?)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        Ok(conn.publish(channel, message).await?)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: i64 = conn.lpush(key, value).await?;
        Ok(())
    }

    async fn info(&self) -> Result<String> {
        // Secondary connection, dropped before returning
        let mut admin = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| Error::Connection(format!("{}: {}", self.addr, e)))?;
        let report: String = ::redis::cmd("INFO").query_async(&mut admin).await?;
        drop(admin);
        Ok(report)
    }

    async fn close(&self) {
        if self.primary.lock().await.take().is_some() {
            debug!("Closed connection to {}", self.addr);
        }
    }
}
