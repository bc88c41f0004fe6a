//! Display models for CLI output

pub mod display;

pub use display::{HistorySection, InterruptDisplay, ThreadDisplay, group_history};
