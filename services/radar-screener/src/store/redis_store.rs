//! Redis store backend (feature `redis-backend`).
//!
//! Uses a `ConnectionManager`, which reconnects automatically; list
//! replacement runs as a MULTI/EXEC pipeline so readers never observe a
//! partially rebuilt list.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use super::{KeyValueStore, StoreError, StoreResult};

/// Keys scanned per SCAN round trip.
const SCAN_BATCH: usize = 200;

fn command_error(e: redis::RedisError) -> StoreError {
    if e.is_connection_dropped() || e.is_io_error() || e.is_timeout() {
        StoreError::Connection(e.to_string())
    } else {
        StoreError::Command(e.to_string())
    }
}

/// Escape glob metacharacters so a key prefix matches literally.
fn scan_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

/// Store backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `redis://host:port/db`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(url = %url, "Connected to Redis store");
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn get_list(&self, key: &str) -> StoreResult<Vec<String>> {
        redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async::<Vec<String>>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn set_list(&self, key: &str, values: &[String]) -> StoreResult<()> {
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("DEL").arg(key).ignore();
        if !values.is_empty() {
            pipe.cmd("RPUSH").arg(key).arg(values).ignore();
        }
        pipe.query_async::<()>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn list_append(&self, key: &str, value: &str) -> StoreResult<()> {
        redis::cmd("RPUSH")
            .arg(key)
            .arg(value)
            .query_async::<i64>(&mut self.conn())
            .await
            .map(|_| ())
            .map_err(command_error)
    }

    async fn list_remove(&self, key: &str, value: &str) -> StoreResult<u64> {
        redis::cmd("LREM")
            .arg(key)
            .arg(0)
            .arg(value)
            .query_async::<u64>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        redis::cmd("SADD")
            .arg(set)
            .arg(member)
            .query_async::<i64>(&mut self.conn())
            .await
            .map(|added| added > 0)
            .map_err(command_error)
    }

    async fn set_remove(&self, set: &str, member: &str) -> StoreResult<bool> {
        redis::cmd("SREM")
            .arg(set)
            .arg(member)
            .query_async::<i64>(&mut self.conn())
            .await
            .map(|removed| removed > 0)
            .map_err(command_error)
    }

    async fn set_contains(&self, set: &str, member: &str) -> StoreResult<bool> {
        redis::cmd("SISMEMBER")
            .arg(set)
            .arg(member)
            .query_async::<bool>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn delete_keys(&self, keys: &[String]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        redis::cmd("DEL")
            .arg(keys)
            .query_async::<u64>(&mut self.conn())
            .await
            .map_err(command_error)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let pattern = scan_pattern(prefix);
        let mut conn = self.conn();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async::<(u64, Vec<String>)>(&mut conn)
                .await
                .map_err(command_error)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> StoreResult<()> {
        let response = redis::cmd("PING")
            .query_async::<String>(&mut self.conn())
            .await
            .map_err(command_error)?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "Unexpected PING reply: {}",
                response
            )))
        }
    }
}
