//! Display model implementations for table and JSON output
//!
//! Display models turn enriched threads into CLI-friendly rows with column
//! names and serialization.

mod common;
mod history;
mod thread;

pub use history::{HistoryEntry, HistoryGroup, HistorySection, group_history};
pub use thread::{InterruptDisplay, ThreadDisplay};
