//! Text-completion client for the beatreel pipeline.
//!
//! The pipeline treats the completion service as opaque: it sends a prompt
//! and reads back text. [`TextCompletion`] is the seam; [`HttpTextClient`]
//! talks to a JSON endpoint and retries transient failures itself, so one
//! `complete` call is one logical request to callers.

pub mod client;
pub mod config;
pub mod error;

pub use client::{HttpTextClient, StaticCompletion, TextCompletion};
pub use config::TextClientConfig;
pub use error::{TextError, TextResult};
