// src/services/store.rs
use crate::errors::ScamGuardError;
use crate::models::*;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn store_analysis(&self, analysis: &ScamAnalysis) -> Result<(), ScamGuardError>;

    async fn get_analysis(&self, analysis_id: &Uuid) -> Result<ScamAnalysis, ScamGuardError>;

    /// Prepends `item` to the session history and drops everything past `limit`.
    async fn push_history(
        &self,
        session_id: &Uuid,
        item: &HistoryItem,
        limit: usize,
    ) -> Result<(), ScamGuardError>;

    /// Newest first.
    async fn history(&self, session_id: &Uuid) -> Result<Vec<HistoryItem>, ScamGuardError>;

    async fn clear_history(&self, session_id: &Uuid) -> Result<(), ScamGuardError>;
}

fn analysis_key(id: &Uuid) -> String {
    format!("analysis:{}", id)
}

fn history_key(session_id: &Uuid) -> String {
    format!("session:{}:history", session_id)
}

pub struct RedisStore {
    client: Client,
    retention_secs: usize,
}

impl RedisStore {
    pub async fn new(redis_url: &str, retention_secs: usize) -> Result<Self, ScamGuardError> {
        let client = Client::open(redis_url)?;

        // Test connection
        let mut conn = client.get_async_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await?;

        Ok(Self {
            client,
            retention_secs,
        })
    }

    async fn connection(&self) -> Result<redis::aio::Connection, ScamGuardError> {
        Ok(self.client.get_async_connection().await?)
    }
}

#[async_trait]
impl ScanStore for RedisStore {
    async fn store_analysis(&self, analysis: &ScamAnalysis) -> Result<(), ScamGuardError> {
        let mut conn = self.connection().await?;
        let value = serde_json::to_string(analysis)?;

        conn.set_ex::<_, _, ()>(analysis_key(&analysis.id), value, self.retention_secs)
            .await?;

        Ok(())
    }

    async fn get_analysis(&self, analysis_id: &Uuid) -> Result<ScamAnalysis, ScamGuardError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(analysis_key(analysis_id)).await?;

        let value = value
            .ok_or_else(|| ScamGuardError::NotFound(format!("analysis {}", analysis_id)))?;
        Ok(serde_json::from_str(&value)?)
    }

    async fn push_history(
        &self,
        session_id: &Uuid,
        item: &HistoryItem,
        limit: usize,
    ) -> Result<(), ScamGuardError> {
        let mut conn = self.connection().await?;
        let key = history_key(session_id);
        let value = serde_json::to_string(item)?;

        redis::pipe()
            .atomic()
            .lpush(&key, value)
            .ignore()
            .ltrim(&key, 0, limit.saturating_sub(1) as isize)
            .ignore()
            .expire(&key, self.retention_secs)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn history(&self, session_id: &Uuid) -> Result<Vec<HistoryItem>, ScamGuardError> {
        let mut conn = self.connection().await?;
        let values: Vec<String> = conn.lrange(history_key(session_id), 0, -1).await?;

        values
            .iter()
            .map(|v| serde_json::from_str(v).map_err(ScamGuardError::from))
            .collect()
    }

    async fn clear_history(&self, session_id: &Uuid) -> Result<(), ScamGuardError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(history_key(session_id)).await?;
        Ok(())
    }
}

/// In-process store for single-node runs; nothing expires.
#[derive(Default)]
pub struct MemoryStore {
    analyses: RwLock<HashMap<Uuid, ScamAnalysis>>,
    histories: RwLock<HashMap<Uuid, Vec<HistoryItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn store_analysis(&self, analysis: &ScamAnalysis) -> Result<(), ScamGuardError> {
        self.analyses
            .write()
            .await
            .insert(analysis.id, analysis.clone());
        Ok(())
    }

    async fn get_analysis(&self, analysis_id: &Uuid) -> Result<ScamAnalysis, ScamGuardError> {
        self.analyses
            .read()
            .await
            .get(analysis_id)
            .cloned()
            .ok_or_else(|| ScamGuardError::NotFound(format!("analysis {}", analysis_id)))
    }

    async fn push_history(
        &self,
        session_id: &Uuid,
        item: &HistoryItem,
        limit: usize,
    ) -> Result<(), ScamGuardError> {
        let mut histories = self.histories.write().await;
        let entries = histories.entry(*session_id).or_default();
        entries.insert(0, item.clone());
        entries.truncate(limit);
        Ok(())
    }

    async fn history(&self, session_id: &Uuid) -> Result<Vec<HistoryItem>, ScamGuardError> {
        Ok(self
            .histories
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_history(&self, session_id: &Uuid) -> Result<(), ScamGuardError> {
        self.histories.write().await.remove(session_id);
        Ok(())
    }
}
