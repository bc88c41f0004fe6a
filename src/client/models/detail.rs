//! Enriched thread view

use serde::{Deserialize, Serialize};

use super::thread::{HumanInterrupt, Thread, ThreadStatus};

/// Display status: the upstream status plus the inbox-only `human_response_needed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxStatus {
    Idle,
    Busy,
    Interrupted,
    Error,
    HumanResponseNeeded,
}

impl InboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboxStatus::Idle => "idle",
            InboxStatus::Busy => "busy",
            InboxStatus::Interrupted => "interrupted",
            InboxStatus::Error => "error",
            InboxStatus::HumanResponseNeeded => "human_response_needed",
        }
    }
}

impl From<ThreadStatus> for InboxStatus {
    fn from(status: ThreadStatus) -> Self {
        match status {
            ThreadStatus::Idle => InboxStatus::Idle,
            ThreadStatus::Busy => InboxStatus::Busy,
            ThreadStatus::Interrupted => InboxStatus::Interrupted,
            ThreadStatus::Error => InboxStatus::Error,
        }
    }
}

/// A thread enriched for display.
///
/// `invalid_schema` means the interrupt data was confirmed malformed or missing.
/// `degraded` means the state call was skipped while the upstream was unhealthy, so
/// nothing is known yet. Either way the detail cannot currently be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: Thread,
    pub status: InboxStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupts: Option<Vec<HumanInterrupt>>,

    #[serde(default)]
    pub invalid_schema: bool,

    #[serde(default)]
    pub degraded: bool,
}

impl ThreadDetail {
    /// Plain detail with the upstream status and no interrupt data.
    pub fn plain(thread: Thread) -> Self {
        let status = thread.status.into();
        Self {
            thread,
            status,
            interrupts: None,
            invalid_schema: false,
            degraded: false,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread.thread_id
    }

    pub fn can_show_detail(&self) -> bool {
        !self.invalid_schema && !self.degraded
    }
}
