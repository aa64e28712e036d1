//! Style reference retrieval seam.
//!
//! Drafting may be enriched with prose samples from reference works. The
//! engine only consults a retriever when one is attached, and a failing
//! retriever never fails an engine operation.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of adding a reference work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceAdded {
    pub id: String,
    pub chunks_added: usize,
}

/// A stored reference work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSummary {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub chunk_count: usize,
}

/// One retrieved prose sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSample {
    pub text: String,
    pub source_title: String,
    pub similarity_score: f32,
}

/// Request for samples matching a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleQuery<'a> {
    pub description: &'a str,
    /// Hint such as `dialogue`, `action` or `description`.
    pub scene_type: Option<&'a str>,
    pub sample_count: usize,
}

/// Similarity search over reference prose.
pub trait StyleRetriever: Send + Sync {
    /// Prepare the retriever for use. Called when it is attached.
    fn enable(&self) -> Result<()> {
        Ok(())
    }

    fn add_reference(&self, title: &str, content: &str, author: Option<&str>)
        -> Result<ReferenceAdded>;

    fn list_references(&self) -> Result<Vec<ReferenceSummary>>;

    /// Returns false when no reference had that id.
    fn remove_reference(&self, id: &str) -> Result<bool>;

    /// Samples for a scene; empty when nothing matches.
    fn style_context_for_scene(&self, query: &StyleQuery<'_>) -> Result<Vec<StyleSample>>;
}
