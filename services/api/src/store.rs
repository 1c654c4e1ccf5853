//! Redis Session Store
//!
//! The primary [`SessionStore`] backend. Sessions are stored as JSON strings
//! under `session:{id}` with a 24-hour expiry refreshed on every save, so
//! abandoned sessions age out on their own. When Redis is not configured or
//! unreachable at startup the service degrades to the in-memory store.

use crate::config::Config;
use aldea_core::session::CallSession;
use aldea_core::store::{MemoryStore, SessionStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::{info, warn};

const SESSION_TTL_SECS: u64 = 86_400;

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, session_id: &str) -> Result<Option<CallSession>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(session_key(session_id)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, mut session: CallSession) -> Result<CallSession> {
        session.updated_at = Utc::now();
        let json = serde_json::to_string(&session)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(session_key(&session.session_id), json, SESSION_TTL_SECS)
            .await?;
        Ok(session)
    }
}

/// Selects the session store backend once at startup.
pub async fn connect_store(config: &Config) -> Arc<dyn SessionStore> {
    match &config.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => {
                info!("connected to Redis session store");
                Arc::new(store)
            }
            Err(error) => {
                warn!(%error, "Redis unreachable, falling back to in-memory session store");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            info!("REDIS_URL not set, using in-memory session store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_format() {
        assert_eq!(session_key("abc-123"), "session:abc-123");
    }
}
