//! Agent profile directory.
//!
//! The gateway resolves which agent answers a call from a read-only
//! directory built at startup. Persistence and editing of agents is the
//! surrounding product's concern.

use std::collections::HashMap;
use std::sync::Arc;
use switchboard_types::AgentProfile;

/// Read-only lookup of agent profiles by id or answering phone number.
#[derive(Clone, Default)]
pub struct AgentDirectory {
    by_id: Arc<HashMap<String, AgentProfile>>,
}

impl AgentDirectory {
    pub fn from_profiles(profiles: Vec<AgentProfile>) -> Self {
        let by_id = profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();
        Self {
            by_id: Arc::new(by_id),
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentProfile> {
        self.by_id.get(agent_id).cloned()
    }

    /// Finds the agent answering a phone number, for inbound calls where
    /// only the dialed number is known.
    pub fn find_by_phone(&self, number: &str) -> Option<AgentProfile> {
        self.by_id
            .values()
            .find(|profile| profile.phone_number.as_deref() == Some(number))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
