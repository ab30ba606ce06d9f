//! tubedigest: a queue-driven video digest pipeline
//!
//! Videos handed over by discovery are queued in SQLite, their content is
//! acquired through a sharing service, summarized by a chain of language
//! models and condensed into a one-line digest.

pub mod acquire;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod error;
pub mod llm;
pub mod meta;
pub mod notify;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod summarize;

pub use config::Config;
pub use error::{Error, Result};
