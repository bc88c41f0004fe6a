//! API trait definitions split by responsibility
//!
//! - [`ThreadReadApi`] - search and fetch operations
//! - [`ThreadWriteApi`] - state mutations and run creation
//!
//! The [`ThreadsApi`](super::ThreadsApi) super-trait combines both.

mod read;
mod write;

pub use read::ThreadReadApi;
pub use write::ThreadWriteApi;
