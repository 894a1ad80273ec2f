//! In-memory `Store` implementation. Default backend; used directly in
//! development and tests, and as the Session Manager's read-through
//! cache target when no persistent backend is configured.

use dashmap::DashMap;
use uuid::Uuid;

use voxbridge_core::{Agent, Error, Result, Session, Turn};

#[derive(Default)]
pub struct InMemoryStore {
    agents: DashMap<Uuid, Agent>,
    sessions: DashMap<Uuid, Session>,
    turns: DashMap<Uuid, Vec<Turn>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an agent record. Exposed for tests and for bootstrapping a
    /// development deployment with no external store configured.
    pub fn put_agent(&self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }
}

#[async_trait::async_trait]
impl voxbridge_core::traits::Store for InMemoryStore {
    async fn get_agent(&self, agent_id: Uuid) -> Result<Agent> {
        self.agents
            .get(&agent_id)
            .map(|a| a.clone())
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.get(&session_id).map(|s| s.clone()))
    }

    async fn create_session(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.id, session.clone());
        self.turns.entry(session.id).or_default();
        Ok(())
    }

    async fn mark_session_inactive(&self, session_id: Uuid) -> Result<()> {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.active = false;
        }
        Ok(())
    }

    async fn append_turn(&self, session_id: Uuid, turn: &Turn) -> Result<()> {
        self.turns.entry(session_id).or_default().push(turn.clone());
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.last_activity = chrono::Utc::now();
        }
        Ok(())
    }

    async fn list_recent_turns(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>> {
        Ok(self
            .turns
            .get(&session_id)
            .map(|turns| {
                let len = turns.len();
                let start = len.saturating_sub(limit);
                turns[start..].to_vec()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_core::traits::Store;
    use voxbridge_core::{ChannelType, LlmAgentConfig, LlmProviderTag, TtsAgentConfig, TurnRole};

    fn agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "test-agent".to_string(),
            llm: LlmAgentConfig {
                provider: LlmProviderTag::Cloud,
                model: "test-model".to_string(),
                temperature: 0.7,
                system_prompt: None,
                use_webhook: false,
            },
            tts: TtsAgentConfig::default(),
            plugins: Default::default(),
        }
    }

    #[tokio::test]
    async fn round_trips_session_and_turns() {
        let store = InMemoryStore::new();
        let a = agent();
        store.put_agent(a.clone());

        let session = Session::new(Uuid::new_v4(), "user-1", a.id, ChannelType::Web);
        store.create_session(&session).await.unwrap();

        let turn = Turn::new(1, TurnRole::User, "hello");
        store.append_turn(session.id, &turn).await.unwrap();

        let turns = store.list_recent_turns(session.id, 20).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "hello");

        store.mark_session_inactive(session.id).await.unwrap();
        let reloaded = store.get_session(session.id).await.unwrap().unwrap();
        assert!(!reloaded.active);
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.get_agent(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn list_recent_turns_respects_limit() {
        let store = InMemoryStore::new();
        let a = agent();
        store.put_agent(a.clone());
        let session = Session::new(Uuid::new_v4(), "user-1", a.id, ChannelType::Web);
        store.create_session(&session).await.unwrap();

        for i in 0..5 {
            let turn = Turn::new(i, TurnRole::User, format!("turn {i}"));
            store.append_turn(session.id, &turn).await.unwrap();
        }

        let turns = store.list_recent_turns(session.id, 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].text, "turn 3");
        assert_eq!(turns[1].text, "turn 4");
    }
}
