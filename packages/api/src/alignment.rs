//! Alignment between regulation text and a stated-goals reference text.
//!
//! The scoring algorithm sits behind [`AlignmentScorer`] so other heuristics
//! can replace the term-overlap default.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::words::tokenize;

/// Similarity between a text and a reference, in `[0, 1]`.
pub trait AlignmentScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, text: &str, reference: &str) -> f64;
}

/// Jaccard overlap of the two texts' content-word sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlapScorer;

impl AlignmentScorer for TermOverlapScorer {
    fn name(&self) -> &'static str {
        "term-overlap"
    }

    fn score(&self, text: &str, reference: &str) -> f64 {
        let a: HashSet<String> = tokenize(text).into_iter().collect();
        let b: HashSet<String> = tokenize(reference).into_iter().collect();
        let union = a.union(&b).count();
        if union == 0 {
            return 0.0;
        }
        a.intersection(&b).count() as f64 / union as f64
    }
}

/// A scorer paired with the configured reference text.
#[derive(Clone)]
pub struct Alignment {
    scorer: Arc<dyn AlignmentScorer>,
    reference: Option<Arc<str>>,
}

impl Alignment {
    pub fn new(scorer: Arc<dyn AlignmentScorer>, reference: Option<String>) -> Self {
        Self {
            scorer,
            reference: reference.map(Arc::from),
        }
    }

    /// No reference text: every score is `None`.
    pub fn disabled() -> Self {
        Self::new(Arc::new(TermOverlapScorer), None)
    }

    /// Term-overlap scoring against the file at `path`, if one is given.
    pub fn load(path: Option<&Path>) -> std::io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::disabled());
        };
        let reference = std::fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), chars = reference.len(), "loaded stated goals");
        Ok(Self::new(Arc::new(TermOverlapScorer), Some(reference)))
    }

    pub fn is_enabled(&self) -> bool {
        self.reference.is_some()
    }

    pub fn scorer_name(&self) -> &'static str {
        self.scorer.name()
    }

    pub fn score(&self, text: &str) -> Option<f64> {
        let reference = self.reference.as_deref()?;
        Some(self.scorer.score(text, reference).clamp(0.0, 1.0))
    }
}

impl std::fmt::Debug for Alignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Alignment")
            .field("scorer", &self.scorer.name())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
