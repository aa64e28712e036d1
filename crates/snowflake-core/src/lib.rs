//! snowflake-core - Core library for Snowflake
//!
//! Durable, versioned state for the ten-stage Snowflake writing workflow:
//!
//! - **db**: SQLite record store behind the `RecordStore` trait
//! - **validation**: write gates for characters, scenes and disasters
//! - **cache**: scoped read-through cache with version tokens
//! - **context**: per-stage context assembly with deficiency signals
//! - **diagnostics**: completion and health report
//! - **engine**: the `Engine` tying them together around one active project
//! - **style**: optional style reference retriever seam

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod style;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use cache::{CacheStats, Scope};
pub use config::EngineConfig;
pub use context::{Artifact, Assembly, ContextBundle, ContextRequest, Deficiency};
pub use db::{Database, RecordKind, RecordStore, RecordWrite};
pub use diagnostics::{HealthIssue, StatusReport, Warning};
pub use engine::Engine;
pub use error::{Error, Result};
pub use types::{
    Character, Disaster, ProjectMetadata, ProjectSettings, ProjectSummary, Scene, SceneArtifact,
    Stage, StageOutput,
};
pub use validation::Validation;
