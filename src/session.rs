//! Per-session state. Everything here lives in process memory and dies with
//! the session (or the process).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadRecord {
    pub identifier: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedModel {
    credential: String,
    model: String,
}

/// The model identifier that last worked, remembered for one credential only.
#[derive(Debug, Clone, Default)]
pub struct ModelCache {
    inner: Arc<Mutex<Option<CachedModel>>>,
}

impl ModelCache {
    pub fn get(&self, credential: &str) -> Option<String> {
        lock(&self.inner)
            .as_ref()
            .filter(|c| c.credential == credential)
            .map(|c| c.model.clone())
    }

    pub fn set(&self, credential: &str, model: &str) {
        *lock(&self.inner) = Some(CachedModel {
            credential: credential.to_string(),
            model: model.to_string(),
        });
    }

    /// Drops the entry only if it still points at `model` for `credential`.
    pub fn evict(&self, credential: &str, model: &str) {
        let mut guard = lock(&self.inner);
        if guard
            .as_ref()
            .is_some_and(|c| c.credential == credential && c.model == model)
        {
            *guard = None;
        }
    }

    pub fn clear(&self) {
        *lock(&self.inner) = None;
    }
}

/// State for one operator who passed the access gate. Only gated sessions
/// are ever stored, so holding an id is the authentication.
#[derive(Debug)]
pub struct Session {
    pub credential: Option<String>,
    pub model_cache: ModelCache,
    pub chat: Vec<ChatMessage>,
    pub leads: Vec<LeadRecord>,
    last_seen: DateTime<Utc>,
}

impl Session {
    fn new(now: DateTime<Utc>) -> Self {
        Session {
            credential: None,
            model_cache: ModelCache::default(),
            chat: Vec::new(),
            leads: Vec::new(),
            last_seen: now,
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_seen > ttl
    }

    pub fn push_lead(&mut self, identifier: &str, status: &str) -> LeadRecord {
        let lead = LeadRecord {
            identifier: identifier.to_string(),
            status: status.to_string(),
            timestamp: Utc::now(),
        };
        self.leads.push(lead.clone());
        lead
    }

    pub fn push_chat(&mut self, role: ChatRole, content: &str) {
        self.chat.push(ChatMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Replaces the session credential. A new credential invalidates the cached model.
    pub fn set_credential(&mut self, credential: Option<String>) {
        let credential = credential.filter(|c| !c.trim().is_empty());
        if credential != self.credential {
            self.model_cache.clear();
        }
        self.credential = credential;
    }
}

/// Sessions idle for longer than `ttl` are dropped.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: Arc::default(),
            ttl,
        }
    }

    /// Opens a session and sweeps idle ones. Returns the id and the number of live sessions.
    pub fn create(&self) -> (Uuid, usize) {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let mut sessions = lock(&self.sessions);
        Self::sweep(&mut sessions, now, self.ttl);
        sessions.insert(id, Session::new(now));
        (id, sessions.len())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        lock(&self.sessions).remove(id).is_some()
    }

    /// Runs `f` against a live session and marks it as seen. The lock is released before returning.
    pub fn with_session<R>(&self, id: &Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        self.with_session_at(id, Utc::now(), f)
    }

    fn with_session_at<R>(
        &self,
        id: &Uuid,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut sessions = lock(&self.sessions);
        if sessions.get(id).is_some_and(|s| s.is_idle(now, self.ttl)) {
            sessions.remove(id);
            return None;
        }
        sessions.get_mut(id).map(|session| {
            session.last_seen = now;
            f(session)
        })
    }

    fn sweep(sessions: &mut HashMap<Uuid, Session>, now: DateTime<Utc>, ttl: Duration) {
        sessions.retain(|_, session| !session.is_idle(now, ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_cache_is_scoped_to_credential() {
        let cache = ModelCache::default();
        cache.set("key-a", "gemini-pro");
        assert_eq!(cache.get("key-a").as_deref(), Some("gemini-pro"));
        assert_eq!(cache.get("key-b"), None);

        cache.evict("key-a", "other-model");
        assert!(cache.get("key-a").is_some());
        cache.evict("key-a", "gemini-pro");
        assert_eq!(cache.get("key-a"), None);
    }

    #[test]
    fn changing_credential_clears_cached_model() {
        let mut session = Session::new(Utc::now());
        session.set_credential(Some("k1".into()));
        session.model_cache.set("k1", "foo");

        session.set_credential(Some("k1".into()));
        assert_eq!(session.model_cache.get("k1").as_deref(), Some("foo"));

        session.set_credential(Some("k2".into()));
        assert_eq!(session.model_cache.get("k1"), None);
        assert_eq!(session.credential.as_deref(), Some("k2"));

        session.set_credential(Some("   ".into()));
        assert_eq!(session.credential, None);
    }

    #[test]
    fn leads_keep_insertion_order_and_allow_duplicates() {
        let mut session = Session::new(Utc::now());
        session.push_lead("acme.com", "drafted");
        session.push_lead("acme.com", "failed");
        let statuses: Vec<_> = session.leads.iter().map(|l| l.status.as_str()).collect();
        assert_eq!(statuses, vec!["drafted", "failed"]);
    }

    #[test]
    fn store_lifecycle() {
        let store = SessionStore::new(Duration::hours(1));
        let (id, live) = store.create();
        assert_eq!(live, 1);
        assert_eq!(store.with_session(&id, |s| s.leads.len()), Some(0));
        assert!(store.remove(&id));
        assert!(store.with_session(&id, |_| ()).is_none());
        assert!(!store.remove(&id));
    }

    #[test]
    fn idle_session_expires_but_active_one_is_kept_alive() {
        let store = SessionStore::new(Duration::minutes(30));
        let (id, _) = store.create();
        let start = Utc::now();

        let later = start + Duration::minutes(20);
        assert!(store.with_session_at(&id, later, |_| ()).is_some());
        // Touched at +20m, so still alive at +40m.
        let much_later = start + Duration::minutes(40);
        assert!(store.with_session_at(&id, much_later, |_| ()).is_some());

        let gone = much_later + Duration::minutes(31);
        assert!(store.with_session_at(&id, gone, |_| ()).is_none());
        assert!(!store.remove(&id));
    }

    #[test]
    fn login_sweeps_idle_sessions() {
        let store = SessionStore::new(Duration::zero());
        let (stale, _) = store.create();
        {
            let mut sessions = lock(&store.sessions);
            if let Some(session) = sessions.get_mut(&stale) {
                session.last_seen = Utc::now() - Duration::seconds(5);
            }
        }

        let (_, live) = store.create();
        assert_eq!(live, 1);
        assert!(!store.remove(&stale));
    }
}
