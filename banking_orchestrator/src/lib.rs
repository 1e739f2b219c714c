//! Banking Analysis Orchestrator
//!
//! A multi-stage customer analysis service that:
//! - Resolves a customer profile, falling back to sample data when the source is down
//! - Retrieves ranked policy excerpts for the customer's query
//! - Runs an ordered pipeline of analysis stages over one shared context
//! - Scores risk deterministically and synthesizes a structured report
//! - Records every run in an append-only interaction log
//!
//! RUN:
//! PROFILE → POLICIES → CONTEXT → STAGES → SCORE → REPORT → LOG

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod policy;
pub mod profile;
pub mod report;
pub mod risk;
pub mod telemetry;
pub mod text;

pub use error::Result;

// Re-export common types
pub use agent::{AnalysisRequest, Orchestrator};
pub use error::{AnalysisError, Fetched, FailureKind};
pub use models::*;
