//! Workflow planning and execution for beatreel.
//!
//! This crate handles:
//! - Planning a request into ordered workflow steps
//! - Executing the steps with per-step status, halting on the first failure
//! - Artist catalog lookup
//! - Procedural visuals, layouts and AI background enrichment
//! - Tagged placeholder artifacts in degraded mode
//! - Bounded concurrent runs and a background retention sweep

pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod layout_builder;
pub mod logging;
pub mod metrics;
pub mod planner;
pub mod retry;
pub mod sweeper;
pub mod visuals;

pub use catalog::{ArtistCatalog, JsonCatalog, StaticCatalog};
pub use config::WorkerConfig;
pub use enrichment::{Enricher, Enrichment};
pub use error::{WorkerError, WorkerResult};
pub use executor::WorkflowExecutor;
pub use logging::{init_tracing, JobLogger};
pub use planner::WorkflowPlanner;
pub use retry::{retry_async, FailureTracker, RetryConfig};
pub use sweeper::RetentionSweeper;
