//! Thread list filters

use std::fmt;

use serde::{Deserialize, Serialize};

use super::thread::ThreadStatus;
use crate::error::SyncError;

/// Largest page the upstream search accepts.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Inbox selection in the list view
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Inbox {
    All,
    #[default]
    Interrupted,
    Idle,
    Busy,
    Error,
    #[value(alias = "human_response_needed")]
    HumanResponseNeeded,
}

impl Inbox {
    pub fn as_str(&self) -> &'static str {
        match self {
            Inbox::All => "all",
            Inbox::Interrupted => "interrupted",
            Inbox::Idle => "idle",
            Inbox::Busy => "busy",
            Inbox::Error => "error",
            Inbox::HumanResponseNeeded => "human_response_needed",
        }
    }

    /// Upstream status filter for this inbox. `All` and `HumanResponseNeeded` search unfiltered.
    pub fn status(&self) -> Option<ThreadStatus> {
        match self {
            Inbox::All | Inbox::HumanResponseNeeded => None,
            Inbox::Interrupted => Some(ThreadStatus::Interrupted),
            Inbox::Idle => Some(ThreadStatus::Idle),
            Inbox::Busy => Some(ThreadStatus::Busy),
            Inbox::Error => Some(ThreadStatus::Error),
        }
    }
}

impl fmt::Display for Inbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// List request: inbox plus page window
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadFilter {
    pub inbox: Inbox,
    pub offset: usize,
    pub limit: usize,
}

impl Default for ThreadFilter {
    fn default() -> Self {
        Self {
            inbox: Inbox::default(),
            offset: 0,
            limit: 10,
        }
    }
}

impl ThreadFilter {
    pub fn new(inbox: Inbox, offset: usize, limit: usize) -> Self {
        Self {
            inbox,
            offset,
            limit,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.limit == 0 {
            return Err(SyncError::InvalidFilter("limit must be at least 1".into()));
        }
        if self.limit > MAX_SEARCH_LIMIT {
            return Err(SyncError::InvalidFilter(format!(
                "limit {} exceeds maximum of {}",
                self.limit, MAX_SEARCH_LIMIT
            )));
        }
        Ok(())
    }

    pub fn status(&self) -> Option<ThreadStatus> {
        self.inbox.status()
    }

    /// Query parameters that distinguish this filter in a cache key.
    pub fn cache_params(&self) -> Vec<(String, String)> {
        vec![
            ("inbox".to_string(), self.inbox.as_str().to_string()),
            ("offset".to_string(), self.offset.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ]
    }
}
