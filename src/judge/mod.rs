//! Judgment service integration.
//!
//! Provides the HTTP client for the remote relevance-judgment service, its
//! wire types, and the bounded polling loop used while a job runs.

mod client;
mod poll;
mod types;

pub use client::JudgmentClient;
pub use poll::{PollOutcome, PollPolicy};
pub use types::{JobState, JobStatus, Judgment, Label, Verdict};
