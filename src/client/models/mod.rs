//! Orchestration service data models
//!
//! Domain types exchanged with the upstream thread service, plus the locally
//! enriched [`ThreadDetail`] the inbox renders.

// We export the full model surface even where a command does not use every type.
#![allow(unused_imports)]

mod detail;
mod filter;
mod run;
mod scope;
mod state;
mod thread;

pub use detail::{InboxStatus, ThreadDetail};
pub use filter::{Inbox, MAX_SEARCH_LIMIT, ThreadFilter};
pub use run::{HumanResponse, HumanResponseKind, Run, RunCommand, StatePatch};
pub use scope::Scope;
pub use state::{ThreadState, ThreadTask};
pub use thread::{
    ActionRequest, HumanInterrupt, IMPROPER_SCHEMA, Interrupt, InterruptConfig, Thread,
    ThreadStatus,
};
