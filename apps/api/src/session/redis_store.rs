use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use tracing::info;

use crate::session::{SessionResult, SessionStore};

const KEY_PREFIX: &str = "talent-mcp:";

/// Shared session store backed by Redis `SET .. EX` / `GET` / `DEL`.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: MultiplexedConnection,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> SessionResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis session store connected");
        Ok(Self { conn })
    }
}

fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> SessionResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET")
            .arg(namespaced(key))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(namespaced(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
