// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis-backed session store.
//!
//! Uses a multiplexed [`ConnectionManager`] (reconnects transparently) and
//! bounds every command with the configured deadline so a slow store surfaces
//! as [`SessionStoreError::Timeout`] instead of hanging the request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, RedisResult};
use tracing::warn;

use super::store::{ttl_secs, SessionStore, SessionStoreError, SessionStoreResult};

/// Compare-and-delete: `DEL` only while the key still holds `ARGV[1]`.
const DELETE_IF_EQ_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

impl From<RedisError> for SessionStoreError {
    fn from(e: RedisError) -> Self {
        SessionStoreError::Unavailable(e.to_string())
    }
}

/// Session store on a remote Redis instance.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisSessionStore {
    /// Connect to `url` (e.g. `redis://:password@host:6379/0`).
    ///
    /// The initial connection is bounded by `op_timeout` as well.
    pub async fn connect(url: &str, op_timeout: Duration) -> SessionStoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| SessionStoreError::Timeout(op_timeout))??;

        Ok(Self { conn, op_timeout })
    }

    /// Run one command under the operation deadline.
    async fn run<T, F>(&self, op: &'static str, fut: F) -> SessionStoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "Redis session store command failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Redis session store command timed out"
                );
                Err(SessionStoreError::Timeout(self.op_timeout))
            }
        }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionStoreResult<()> {
        let mut conn = self.conn.clone();
        self.run("set", async move {
            let _: () = conn.set_ex(key, value, ttl_secs(ttl)).await?;
            Ok(())
        })
        .await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> SessionStoreResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = self
            .run("set_nx", async move {
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs(ttl))
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        // Nil reply means the key already existed.
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> SessionStoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("get", async move { conn.get(key).await }).await
    }

    async fn exists(&self, key: &str) -> SessionStoreResult<bool> {
        let mut conn = self.conn.clone();
        self.run("exists", async move { conn.exists(key).await }).await
    }

    async fn delete(&self, key: &str) -> SessionStoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = self.run("del", async move { conn.del(key).await }).await?;
        Ok(removed > 0)
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> SessionStoreResult<bool> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(DELETE_IF_EQ_SCRIPT);
        let removed: u64 = self
            .run("del_if_eq", async move {
                script.key(key).arg(expected).invoke_async(&mut conn).await
            })
            .await?;
        Ok(removed > 0)
    }

    async fn flush_all(&self) -> SessionStoreResult<()> {
        let mut conn = self.conn.clone();
        self.run("flushdb", async move {
            let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> SessionStoreResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .run("ping", async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(SessionStoreError::Protocol(format!("PING answered {pong:?}")))
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let result = RedisSessionStore::connect("not-a-redis-url", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(SessionStoreError::Unavailable(_))));
    }

    #[test]
    fn redis_errors_map_to_unavailable() {
        let err = RedisError::from((redis::ErrorKind::IoError, "connection refused"));
        assert!(matches!(
            SessionStoreError::from(err),
            SessionStoreError::Unavailable(_)
        ));
    }
}
