//! Call session registry.
//!
//! Every mutation of call state goes through the registry's methods; nothing
//! else holds a reference to the underlying map. Mutators are
//! fire-and-forget: callers get no confirmation and must not depend on one.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use switchboard_types::{CallStatus, ConversationTurn, TurnRole};

/// Cap on the per-call conversation log. Oldest turns are dropped first.
const MAX_CONVERSATION_TURNS: usize = 20;

/// One live (or recently ended) call session.
#[derive(Debug, Clone)]
struct CallSession {
    stream_id: Option<String>,
    agent_id: Option<String>,
    status: CallStatus,
    conversation: VecDeque<ConversationTurn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CallSession {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            stream_id: None,
            agent_id: None,
            status: CallStatus::Initiated,
            conversation: VecDeque::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A conversation log entry with the timestamp stripped, as handed to the
/// response orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    pub role: TurnRole,
    pub text: String,
}

/// In-process table of call sessions keyed by telephony call id.
///
/// Sessions are created by whichever signal referencing the call id arrives
/// first (webhook status callback or media stream start — the two race) and
/// are removed only by [`CallRegistry::reap_terminal`].
#[derive(Clone, Default)]
pub struct CallRegistry {
    sessions: Arc<RwLock<HashMap<String, CallSession>>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Option<RwLockReadGuard<'_, HashMap<String, CallSession>>> {
        match self.sessions.read() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::error!("call registry lock poisoned; read skipped");
                None
            }
        }
    }

    fn write(&self) -> Option<RwLockWriteGuard<'_, HashMap<String, CallSession>>> {
        match self.sessions.write() {
            Ok(guard) => Some(guard),
            Err(_) => {
                tracing::error!("call registry lock poisoned; write skipped");
                None
            }
        }
    }

    /// Records that a call exists, optionally binding its agent.
    ///
    /// Idempotent upsert: an already-set agent id is never overwritten with
    /// `None`, so the webhook/stream-start race cannot erase the binding.
    pub fn record_call_start(&self, call_id: &str, agent_id: Option<&str>) {
        if call_id.is_empty() {
            return;
        }
        let Some(mut sessions) = self.write() else {
            return;
        };
        let session = sessions
            .entry(call_id.to_string())
            .or_insert_with(CallSession::new);
        if let Some(agent_id) = agent_id {
            session.agent_id = Some(agent_id.to_string());
        }
        session.updated_at = Utc::now();
    }

    /// Binds the media stream id assigned when the stream opened.
    pub fn record_stream_id(&self, call_id: &str, stream_id: &str) {
        if call_id.is_empty() {
            return;
        }
        let Some(mut sessions) = self.write() else {
            return;
        };
        let session = sessions
            .entry(call_id.to_string())
            .or_insert_with(CallSession::new);
        session.stream_id = Some(stream_id.to_string());
        session.updated_at = Utc::now();
    }

    /// Applies a lifecycle status update.
    ///
    /// Terminal statuses are sticky: once a call has completed or failed, no
    /// further update can resurrect it. Late provider callbacks for an ended
    /// call are logged at debug and dropped.
    pub fn update_status(&self, call_id: &str, status: CallStatus) {
        if call_id.is_empty() {
            return;
        }
        let Some(mut sessions) = self.write() else {
            return;
        };
        let session = sessions
            .entry(call_id.to_string())
            .or_insert_with(CallSession::new);
        if session.status.is_terminal() {
            tracing::debug!(
                call_id,
                current = session.status.as_str(),
                incoming = status.as_str(),
                "ignoring status update for terminated call"
            );
            return;
        }
        session.status = status;
        session.updated_at = Utc::now();
    }

    /// Appends a conversation turn, truncating to the most recent
    /// [`MAX_CONVERSATION_TURNS`].
    ///
    /// No-ops silently on an empty call id or empty text.
    pub fn append_turn(&self, call_id: &str, role: TurnRole, text: &str) {
        if call_id.is_empty() || text.is_empty() {
            return;
        }
        let Some(mut sessions) = self.write() else {
            return;
        };
        let session = sessions
            .entry(call_id.to_string())
            .or_insert_with(CallSession::new);
        session.conversation.push_back(ConversationTurn {
            role,
            text: text.to_string(),
            timestamp: Utc::now(),
        });
        while session.conversation.len() > MAX_CONVERSATION_TURNS {
            session.conversation.pop_front();
        }
        session.updated_at = Utc::now();
    }

    /// Returns the agent bound to a call, if known.
    pub fn agent_id(&self, call_id: &str) -> Option<String> {
        self.read()?.get(call_id)?.agent_id.clone()
    }

    /// Returns the current lifecycle status of a call, if known.
    pub fn status(&self, call_id: &str) -> Option<CallStatus> {
        let sessions = self.read()?;
        let session = sessions.get(call_id)?;
        Some(session.status.clone())
    }

    /// True iff the call is currently in progress.
    pub fn is_active(&self, call_id: &str) -> bool {
        self.status(call_id)
            .map(|status| status.is_active())
            .unwrap_or(false)
    }

    /// Returns the conversation log in order, timestamps stripped.
    pub fn conversation(&self, call_id: &str) -> Vec<ConversationEntry> {
        let Some(sessions) = self.read() else {
            return Vec::new();
        };
        match sessions.get(call_id) {
            Some(session) => session
                .conversation
                .iter()
                .map(|turn| ConversationEntry {
                    role: turn.role,
                    text: turn.text.clone(),
                })
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of sessions currently held.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes sessions that reached a terminal status longer than `ttl`
    /// ago. Returns how many were removed.
    ///
    /// Non-terminal sessions are never reaped, however old: a webhook may
    /// still terminate them later.
    pub fn reap_terminal(&self, ttl: Duration) -> usize {
        let Some(mut sessions) = self.write() else {
            return 0;
        };
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        let before = sessions.len();
        sessions.retain(|_, session| {
            !(session.status.is_terminal() && session.updated_at < cutoff)
        });
        before - sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_start_does_not_erase_agent_binding() {
        let registry = CallRegistry::new();
        registry.record_call_start("CA1", Some("agent-7"));
        registry.record_call_start("CA1", None);
        assert_eq!(registry.agent_id("CA1"), Some("agent-7".to_string()));
    }

    #[test]
    fn agent_binding_can_arrive_after_session_creation() {
        let registry = CallRegistry::new();
        registry.update_status("CA1", CallStatus::Ringing);
        assert_eq!(registry.agent_id("CA1"), None);
        registry.record_call_start("CA1", Some("agent-7"));
        assert_eq!(registry.agent_id("CA1"), Some("agent-7".to_string()));
    }

    #[test]
    fn status_updates_are_sticky_after_terminal() {
        let registry = CallRegistry::new();
        registry.update_status("CA1", CallStatus::InProgress);
        registry.update_status("CA1", CallStatus::Completed);
        registry.update_status("CA1", CallStatus::InProgress);
        assert_eq!(registry.status("CA1"), Some(CallStatus::Completed));
        assert!(!registry.is_active("CA1"));
    }

    #[test]
    fn is_active_only_for_in_progress() {
        let registry = CallRegistry::new();
        registry.update_status("CA1", CallStatus::Ringing);
        assert!(!registry.is_active("CA1"));
        registry.update_status("CA1", CallStatus::InProgress);
        assert!(registry.is_active("CA1"));
        assert!(!registry.is_active("CA2"));
    }

    #[test]
    fn conversation_capped_at_twenty_most_recent() {
        let registry = CallRegistry::new();
        for i in 1..=25 {
            registry.append_turn("CA1", TurnRole::User, &format!("turn {i}"));
        }
        let log = registry.conversation("CA1");
        assert_eq!(log.len(), 20);
        assert_eq!(log[0].text, "turn 6");
        assert_eq!(log[19].text, "turn 25");
    }

    #[test]
    fn append_turn_ignores_empty_input() {
        let registry = CallRegistry::new();
        registry.append_turn("", TurnRole::User, "hello");
        registry.append_turn("CA1", TurnRole::User, "");
        assert!(registry.conversation("CA1").is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn conversation_preserves_roles_in_order() {
        let registry = CallRegistry::new();
        registry.append_turn("CA1", TurnRole::User, "hi");
        registry.append_turn("CA1", TurnRole::Assistant, "hello there");
        let log = registry.conversation("CA1");
        assert_eq!(
            log,
            vec![
                ConversationEntry {
                    role: TurnRole::User,
                    text: "hi".to_string()
                },
                ConversationEntry {
                    role: TurnRole::Assistant,
                    text: "hello there".to_string()
                },
            ]
        );
    }

    #[test]
    fn reap_removes_only_stale_terminal_sessions() {
        let registry = CallRegistry::new();
        registry.update_status("live", CallStatus::InProgress);
        registry.update_status("done", CallStatus::Completed);
        // Zero TTL makes "done" immediately stale.
        let removed = registry.reap_terminal(Duration::from_secs(0));
        assert_eq!(removed, 1);
        assert_eq!(registry.status("done"), None);
        assert_eq!(registry.status("live"), Some(CallStatus::InProgress));
    }

    #[test]
    fn reap_keeps_recent_terminal_sessions() {
        let registry = CallRegistry::new();
        registry.update_status("done", CallStatus::Completed);
        let removed = registry.reap_terminal(Duration::from_secs(3600));
        assert_eq!(removed, 0);
        assert_eq!(registry.status("done"), Some(CallStatus::Completed));
    }
}
