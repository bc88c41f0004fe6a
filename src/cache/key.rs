//! Composite cache keys with SHA-256 fingerprints

use std::fmt;

use sha2::{Digest, Sha256};

use crate::client::models::Scope;

/// Which upstream read a cached value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Enriched thread list for a filter
    Threads,
    /// Single thread summary
    Thread,
    /// Thread state snapshot
    ThreadState,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Threads => "threads",
            Endpoint::Thread => "thread",
            Endpoint::ThreadState => "thread_state",
        }
    }
}

/// Cache key: endpoint + scope + optional thread + sorted query parameters.
///
/// Parameters are sorted on construction, so equality and hashing ignore the
/// order they were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: Endpoint,
    scope: Scope,
    thread_id: Option<String>,
    params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(endpoint: Endpoint, scope: &Scope) -> Self {
        Self {
            endpoint,
            scope: scope.clone(),
            thread_id: None,
            params: Vec::new(),
        }
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self.params.sort();
        self
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Deterministic hex digest naming this entry in durable storage.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();

        hasher.update(self.endpoint.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.scope.agent_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.scope.deployment_id.as_bytes());
        hasher.update(b"|");
        if let Some(thread_id) = &self.thread_id {
            hasher.update(thread_id.as_bytes());
        }
        hasher.update(b"|");

        for (k, v) in &self.params {
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
            hasher.update(b"&");
        }

        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.endpoint.as_str(), self.scope)?;
        if let Some(thread_id) = &self.thread_id {
            write!(f, "/{}", thread_id)?;
        }
        for (k, v) in &self.params {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}

/// Selects every key in a scope, optionally narrowed by endpoint and thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    pub scope: Scope,
    pub endpoint: Option<Endpoint>,
    pub thread_id: Option<String>,
}

impl KeyFilter {
    pub fn scope(scope: &Scope) -> Self {
        Self {
            scope: scope.clone(),
            endpoint: None,
            thread_id: None,
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        key.scope == self.scope
            && self.endpoint.is_none_or(|e| e == key.endpoint)
            && self
                .thread_id
                .as_deref()
                .is_none_or(|id| key.thread_id() == Some(id))
    }
}
