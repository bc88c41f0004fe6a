//! Agent/deployment scope

use std::fmt;

use serde::{Deserialize, Serialize};

/// The (agent, deployment) pair every cache entry and facade is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    /// Assistant (agent) identifier, sent as `metadata.assistant_id`
    pub agent_id: String,

    /// Deployment identifier, selects the upstream base URL
    pub deployment_id: String,
}

impl Scope {
    pub fn new(agent_id: impl Into<String>, deployment_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            deployment_id: deployment_id.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agent_id, self.deployment_id)
    }
}
