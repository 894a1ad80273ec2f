use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::interval;
use uuid::Uuid;

use voxbridge_config::SessionConfig;
use voxbridge_core::traits::Store;
use voxbridge_core::{Agent, ChannelType, Error, Result, Session, Turn};

struct CachedState {
    session: Session,
    agent: Option<Agent>,
    context: VecDeque<Turn>,
}

struct CacheEntry {
    state: tokio::sync::Mutex<CachedState>,
    last_activity: parking_lot::Mutex<Instant>,
}

impl CacheEntry {
    fn new(session: Session, context: Vec<Turn>) -> Self {
        Self {
            state: tokio::sync::Mutex::new(CachedState {
                session,
                agent: None,
                context: context.into(),
            }),
            last_activity: parking_lot::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// A session paired with its owning manager's id, handed back to callers so
/// they never need to re-resolve `Option<Uuid>` plumbing themselves.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub session: Session,
}

/// Keeps active sessions warm in memory, reading through to a [`Store`] on
/// cache miss and writing through on every turn append. One [`CacheEntry`]
/// per session carries its own lock, so turn-level mutations on different
/// sessions never contend.
pub struct SessionManager {
    store: Arc<dyn Store>,
    cache: DashMap<Uuid, Arc<CacheEntry>>,
    config: SessionConfig,
    sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, config: SessionConfig) -> Arc<Self> {
        let manager = Arc::new(Self {
            store,
            cache: DashMap::new(),
            config,
            sweeper: parking_lot::Mutex::new(None),
            shutdown: Arc::new(AtomicBool::new(false)),
        });
        manager.clone().spawn_sweeper();
        manager
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let ttl = Duration::from_secs(self.config.context_cache_ttl_min * 60);
        let period = Duration::from_secs(self.config.cache_cleanup_interval_s);
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                let evicted = self.sweep_idle(ttl);
                if evicted > 0 {
                    tracing::debug!(evicted, "session cache sweeper evicted idle entries");
                }
            }
        });
        *self.sweeper.lock() = Some(handle);
    }

    /// Removes cache entries idle past `ttl`. Does not touch the store:
    /// eviction is purely a cache decision, and a later `get_or_create` for
    /// the same id reloads from the store transparently.
    fn sweep_idle(&self, ttl: Duration) -> usize {
        let stale: Vec<Uuid> = self
            .cache
            .iter()
            .filter(|entry| entry.value().idle_for() >= ttl)
            .map(|entry| *entry.key())
            .collect();
        for id in &stale {
            self.cache.remove(id);
        }
        stale.len()
    }

    /// Looks a session up in cache, falling back to the store on miss and
    /// re-inserting it (the eviction re-access path from §4.1).
    async fn load_entry(&self, session_id: Uuid) -> Result<Arc<CacheEntry>> {
        if let Some(entry) = self.cache.get(&session_id) {
            entry.touch();
            return Ok(entry.clone());
        }

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;

        let context = self
            .store
            .list_recent_turns(session_id, self.config.context_max_turns)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(session_id = %session_id, error = %e, "context reload failed, starting empty");
                Vec::new()
            });

        let entry = Arc::new(CacheEntry::new(session, context));
        self.cache.insert(session_id, entry.clone());
        Ok(entry)
    }

    /// Returns the existing session for `session_id`, or creates a new one
    /// scoped to `user_id`/`agent_id`/`channel` when `session_id` is `None`.
    pub async fn get_or_create(
        &self,
        session_id: Option<Uuid>,
        user_id: &str,
        agent_id: Uuid,
        channel: ChannelType,
    ) -> Result<SessionHandle> {
        if let Some(id) = session_id {
            let entry = self.load_entry(id).await?;
            let state = entry.state.lock().await;
            if state.session.user_id != user_id {
                return Err(Error::OwnershipMismatch);
            }
            return Ok(SessionHandle {
                session: state.session.clone(),
            });
        }

        // New session: the agent must exist before we persist anything.
        self.store.get_agent(agent_id).await?;

        let id = Uuid::new_v4();
        let session = Session::new(id, user_id, agent_id, channel);
        self.store.create_session(&session).await?;

        let entry = Arc::new(CacheEntry::new(session.clone(), Vec::new()));
        self.cache.insert(id, entry);

        Ok(SessionHandle { session })
    }

    /// Read-through agent lookup, cached per session for the lifetime of the
    /// cache entry (an agent's config does not change mid-session).
    pub async fn get_agent(&self, session_id: Uuid) -> Result<Agent> {
        let entry = self.load_entry(session_id).await?;
        let mut state = entry.state.lock().await;
        if let Some(agent) = &state.agent {
            return Ok(agent.clone());
        }
        let agent = self.store.get_agent(state.session.agent_id).await?;
        state.agent = Some(agent.clone());
        Ok(agent)
    }

    /// Returns up to `limit` most recent turns, most-recent-last, serving
    /// from cache when present. A transient store failure on the initial
    /// load yields an empty context rather than failing the caller (§4.1).
    pub async fn get_context(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>> {
        let entry = self.load_entry(session_id).await?;
        let state = entry.state.lock().await;
        let start = state.context.len().saturating_sub(limit);
        Ok(state.context.iter().skip(start).cloned().collect())
    }

    /// Appends a turn to both the cache and the store. The cache update
    /// always succeeds; a persistent write failure is retried with bounded
    /// exponential backoff before surfacing `StoreUnavailable` to the
    /// caller, who treats it as fatal for the turn, not the session.
    pub async fn append_turn(&self, session_id: Uuid, turn: Turn) -> Result<()> {
        let entry = self.load_entry(session_id).await?;
        let mut state = entry.state.lock().await;
        state.context.push_back(turn.clone());
        while state.context.len() > self.config.context_max_turns {
            state.context.pop_front();
        }
        state.session.last_activity = chrono::Utc::now();
        drop(state);
        entry.touch();

        const MAX_ATTEMPTS: u32 = 3;
        let mut attempt = 0;
        loop {
            match self.store.append_turn(session_id, &turn).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
                    tracing::warn!(session_id = %session_id, attempt, error = %e, "turn append retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "turn append failed permanently");
                    return Err(e);
                }
            }
        }
    }

    /// Refreshes a session's idle clock without touching its content.
    pub async fn touch(&self, session_id: Uuid) -> Result<()> {
        let entry = self.load_entry(session_id).await?;
        entry.touch();
        Ok(())
    }

    /// Ends a session: always removes it from cache; `persist` additionally
    /// marks it inactive in the store. Calling this twice is a no-op the
    /// second time.
    pub async fn end(&self, session_id: Uuid, persist: bool) -> Result<()> {
        self.cache.remove(&session_id);
        if persist {
            self.store.mark_session_inactive(session_id).await?;
        }
        Ok(())
    }

    /// Session ids currently warm in cache. Does not reflect sessions that
    /// are active in the store but have fallen out of cache via the sweeper.
    pub fn list_active(&self) -> Vec<Uuid> {
        self.cache.iter().map(|entry| *entry.key()).collect()
    }

    /// Stops the background sweeper. Intended for graceful shutdown; safe to
    /// call more than once.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_core::{LlmAgentConfig, LlmProviderTag, TtsAgentConfig, TurnRole};
    use voxbridge_store::InMemoryStore;

    fn agent() -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: "test".to_string(),
            llm: LlmAgentConfig {
                provider: LlmProviderTag::Cloud,
                model: "m".to_string(),
                temperature: 0.7,
                system_prompt: None,
                use_webhook: false,
            },
            tts: TtsAgentConfig::default(),
            plugins: Default::default(),
        }
    }

    fn manager() -> (Arc<SessionManager>, Arc<InMemoryStore>, Agent) {
        let store = Arc::new(InMemoryStore::new());
        let a = agent();
        store.put_agent(a.clone());
        let manager = SessionManager::new(store.clone(), SessionConfig {
            context_cache_ttl_min: 15,
            context_max_turns: 20,
            cache_cleanup_interval_s: 3600,
        });
        (manager, store, a)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn creates_and_reloads_session() {
        let (manager, _store, a) = manager();
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();
        let id = handle.session.id;

        let reloaded = manager
            .get_or_create(Some(id), "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();
        assert_eq!(reloaded.session.id, id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_ownership_mismatch() {
        let (manager, _store, a) = manager();
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();

        let err = manager
            .get_or_create(Some(handle.session.id), "someone-else", a.id, ChannelType::Web)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OwnershipMismatch));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_session_id_is_not_found() {
        let (manager, _store, a) = manager();
        let _ = &a;
        let err = manager
            .get_or_create(Some(Uuid::new_v4()), "user-1", a.id, ChannelType::Web)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn context_round_trips_through_append() {
        let (manager, _store, a) = manager();
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();

        manager
            .append_turn(handle.session.id, Turn::new(1, TurnRole::User, "hi"))
            .await
            .unwrap();
        manager
            .append_turn(handle.session.id, Turn::new(2, TurnRole::Assistant, "hello"))
            .await
            .unwrap();

        let context = manager.get_context(handle.session.id, 20).await.unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].text, "hi");
        assert_eq!(context[1].text, "hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_is_idempotent() {
        let (manager, _store, a) = manager();
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();

        manager.end(handle.session.id, true).await.unwrap();
        manager.end(handle.session.id, true).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_agent_is_cached_read_through() {
        let (manager, _store, a) = manager();
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();

        let fetched = manager.get_agent(handle.session.id).await.unwrap();
        assert_eq!(fetched.id, a.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_active_reflects_cache() {
        let (manager, _store, a) = manager();
        assert!(manager.list_active().is_empty());
        let handle = manager
            .get_or_create(None, "user-1", a.id, ChannelType::Web)
            .await
            .unwrap();
        assert_eq!(manager.list_active(), vec![handle.session.id]);
    }
}
