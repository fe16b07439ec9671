//! Session Store
//!
//! Per-user record of the last replication action and of the master
//! credentials entered in the change-master form. One browser tab writes
//! to a session at a time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::replication::MasterCredentials;

/// Outcome status of the last action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Error,
    #[default]
    Unknown,
}

/// Message left for the next page view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionMessage {
    pub status: ActionStatus,
    pub info: String,
}

impl ActionMessage {
    pub fn success(info: impl Into<String>) -> Self {
        Self { status: ActionStatus::Success, info: info.into() }
    }

    pub fn error(info: impl Into<String>) -> Self {
        Self { status: ActionStatus::Error, info: info.into() }
    }
}

/// Cached change-master credentials
#[derive(Debug, Clone, Serialize)]
pub struct CachedMaster {
    pub credentials: MasterCredentials,
    /// The candidate accepted the credentials and reported a position
    pub correct: bool,
}

/// Everything stored for one session
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationSession {
    pub action: Option<ActionMessage>,
    pub master: Option<CachedMaster>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ReplicationSession {
    fn default() -> Self {
        Self {
            action: None,
            master: None,
            updated_at: Utc::now(),
        }
    }
}

/// In-memory session store keyed by session id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, ReplicationSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an action
    pub async fn set_action(&self, session_id: &str, message: ActionMessage) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_default();
        session.action = Some(message);
        session.updated_at = Utc::now();
    }

    /// Take the pending action message. Only success and error messages are
    /// returned; taking one resets the status to unknown.
    pub async fn take_action(&self, session_id: &str) -> Option<ActionMessage> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(session_id)?;

        let pending = session
            .action
            .as_ref()
            .filter(|m| m.status != ActionStatus::Unknown)
            .cloned()?;

        session.action = Some(ActionMessage {
            status: ActionStatus::Unknown,
            info: pending.info.clone(),
        });
        session.updated_at = Utc::now();
        Some(pending)
    }

    /// Cache master credentials; `correct` starts false
    pub async fn set_master(&self, session_id: &str, credentials: MasterCredentials) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id.to_string()).or_default();
        session.master = Some(CachedMaster { credentials, correct: false });
        session.updated_at = Utc::now();
    }

    /// Mark the cached master credentials as verified
    pub async fn mark_master_correct(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if let Some(master) = session.master.as_mut() {
                master.correct = true;
                session.updated_at = Utc::now();
            }
        }
    }

    /// Snapshot of a session
    pub async fn get(&self, session_id: &str) -> Option<ReplicationSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop sessions idle since before `cutoff`
    pub async fn expire_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.updated_at >= cutoff);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> MasterCredentials {
        MasterCredentials {
            user: "repl".into(),
            password: "secret".into(),
            host: "db1".into(),
            port: 3306,
        }
    }

    #[tokio::test]
    async fn test_action_message_is_consumed() {
        let store = SessionStore::new();
        store.set_action("s1", ActionMessage::error("Unable to change master!")).await;

        let msg = store.take_action("s1").await.unwrap();
        assert_eq!(msg.status, ActionStatus::Error);
        assert_eq!(msg.info, "Unable to change master!");

        assert!(store.take_action("s1").await.is_none());
        let session = store.get("s1").await.unwrap();
        assert_eq!(session.action.unwrap().status, ActionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_sessions_are_separate() {
        let store = SessionStore::new();
        store.set_action("a", ActionMessage::success("ok")).await;
        assert!(store.take_action("b").await.is_none());
        assert!(store.take_action("a").await.is_some());
    }

    #[tokio::test]
    async fn test_master_cache() {
        let store = SessionStore::new();
        store.set_master("s1", creds()).await;
        assert!(!store.get("s1").await.unwrap().master.unwrap().correct);

        store.mark_master_correct("s1").await;
        let master = store.get("s1").await.unwrap().master.unwrap();
        assert!(master.correct);
        assert_eq!(master.credentials.host, "db1");

        // password never leaves the process
        let json = serde_json::to_string(&master).unwrap();
        assert!(!json.contains("secret"));
    }

    #[tokio::test]
    async fn test_marking_master_keeps_session_alive() {
        let store = SessionStore::new();
        store.set_master("s1", creds()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let cutoff = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.mark_master_correct("s1").await;

        assert_eq!(store.expire_before(cutoff).await, 0);
        assert!(store.get("s1").await.unwrap().master.unwrap().correct);
    }

    #[tokio::test]
    async fn test_expire() {
        let store = SessionStore::new();
        store.set_action("old", ActionMessage::success("x")).await;
        assert_eq!(store.expire_before(Utc::now() + chrono::Duration::seconds(1)).await, 1);
        assert_eq!(store.len().await, 0);
    }
}
