//! ScyllaDB-backed `Store` implementation, enabled by the `scylla-backend`
//! feature. Grounded in the teacher persistence crate's client/schema
//! split: connect, ensure schema, then issue prepared queries per call.

use std::sync::Arc;

use scylla::{IntoTypedRows, Session as ScyllaSession, SessionBuilder};
use uuid::Uuid;

use voxbridge_config::PersistenceConfig;
use voxbridge_core::{Agent, Error, Result, Session, Turn};

pub struct ScyllaStore {
    session: Arc<ScyllaSession>,
    keyspace: String,
}

impl ScyllaStore {
    pub async fn connect(cfg: &PersistenceConfig) -> Result<Self> {
        tracing::info!(hosts = ?cfg.scylla_hosts, keyspace = %cfg.keyspace, "connecting to scylla");
        let session = SessionBuilder::new()
            .known_nodes(&cfg.scylla_hosts)
            .build()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        let store = Self {
            session: Arc::new(session),
            keyspace: cfg.keyspace.clone(),
        };
        store.ensure_schema(cfg.replication_factor).await?;
        Ok(store)
    }

    async fn ensure_schema(&self, replication_factor: u8) -> Result<()> {
        let ks = &self.keyspace;
        self.query(format!(
            "CREATE KEYSPACE IF NOT EXISTS {ks} WITH replication = \
             {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
        ))
        .await?;

        self.query(format!(
            "CREATE TABLE IF NOT EXISTS {ks}.agents (
                agent_id UUID PRIMARY KEY,
                record TEXT
            )"
        ))
        .await?;

        self.query(format!(
            "CREATE TABLE IF NOT EXISTS {ks}.sessions (
                session_id UUID PRIMARY KEY,
                record TEXT
            )"
        ))
        .await?;

        self.query(format!(
            "CREATE TABLE IF NOT EXISTS {ks}.turns (
                session_id UUID,
                turn_id BIGINT,
                record TEXT,
                PRIMARY KEY ((session_id), turn_id)
            ) WITH CLUSTERING ORDER BY (turn_id ASC)"
        ))
        .await?;

        Ok(())
    }

    async fn query(&self, cql: impl Into<String>) -> Result<scylla::QueryResult> {
        self.session
            .query_unpaged(cql.into(), &[])
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))
    }
}

#[async_trait::async_trait]
impl voxbridge_core::traits::Store for ScyllaStore {
    async fn get_agent(&self, agent_id: Uuid) -> Result<Agent> {
        let ks = &self.keyspace;
        let rows = self
            .session
            .query_unpaged(
                format!("SELECT record FROM {ks}.agents WHERE agent_id = ?"),
                (agent_id,),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .rows
            .unwrap_or_default();

        let row: (String,) = rows
            .into_typed::<(String,)>()
            .next()
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        serde_json::from_str(&row.0).map_err(|e| Error::StoreUnavailable(e.to_string()))
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        let ks = &self.keyspace;
        let rows = self
            .session
            .query_unpaged(
                format!("SELECT record FROM {ks}.sessions WHERE session_id = ?"),
                (session_id,),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .rows
            .unwrap_or_default();

        match rows.into_typed::<(String,)>().next() {
            None => Ok(None),
            Some(row) => {
                let (json,) = row.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
                let session = serde_json::from_str(&json)
                    .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
                Ok(Some(session))
            }
        }
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        let ks = &self.keyspace;
        let json = serde_json::to_string(session).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        self.session
            .query_unpaged(
                format!("INSERT INTO {ks}.sessions (session_id, record) VALUES (?, ?)"),
                (session.id, json),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn mark_session_inactive(&self, session_id: Uuid) -> Result<()> {
        if let Some(mut session) = self.get_session(session_id).await? {
            session.active = false;
            self.create_session(&session).await?;
        }
        Ok(())
    }

    async fn append_turn(&self, session_id: Uuid, turn: &Turn) -> Result<()> {
        let ks = &self.keyspace;
        let json = serde_json::to_string(turn).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        self.session
            .query_unpaged(
                format!("INSERT INTO {ks}.turns (session_id, turn_id, record) VALUES (?, ?, ?)"),
                (session_id, turn.id as i64, json),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn list_recent_turns(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>> {
        let ks = &self.keyspace;
        let rows = self
            .session
            .query_unpaged(
                format!(
                    "SELECT record FROM {ks}.turns WHERE session_id = ? ORDER BY turn_id DESC LIMIT ?"
                ),
                (session_id, limit as i32),
            )
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?
            .rows
            .unwrap_or_default();

        let mut turns = Vec::new();
        for row in rows.into_typed::<(String,)>() {
            let (json,) = row.map_err(|e| Error::StoreUnavailable(e.to_string()))?;
            turns.push(serde_json::from_str(&json).map_err(|e| Error::StoreUnavailable(e.to_string()))?);
        }
        turns.reverse();
        Ok(turns)
    }
}
