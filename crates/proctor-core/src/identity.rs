//! Identity consistency against the enrolled reference

use proctor_api::IdentityFlags;
use proctor_config::IdentityPolicy;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Face match failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("Embedding dimension mismatch: reference has {expected}, candidate has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Matcher backend error: {0}")]
    Backend(String),
}

/// Decides whether a candidate embedding belongs to the enrolled person
pub trait FaceMatcher: Send + Sync {
    fn matches(&self, reference: &[f64], candidate: &[f64], tolerance: f64)
    -> Result<bool, MatchError>;
}

/// Euclidean distance match, inclusive of the tolerance
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl FaceMatcher for EuclideanMatcher {
    fn matches(
        &self,
        reference: &[f64],
        candidate: &[f64],
        tolerance: f64,
    ) -> Result<bool, MatchError> {
        if reference.len() != candidate.len() {
            return Err(MatchError::DimensionMismatch {
                expected: reference.len(),
                actual: candidate.len(),
            });
        }

        let distance = reference
            .iter()
            .zip(candidate)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt();

        Ok(distance <= tolerance)
    }
}

/// Classifies the visible face population for one tick
#[derive(Clone)]
pub struct IdentityMonitor {
    tolerance: f64,
    matcher: Arc<dyn FaceMatcher>,
}

impl IdentityMonitor {
    pub fn new(policy: &IdentityPolicy, matcher: Arc<dyn FaceMatcher>) -> Self {
        Self {
            tolerance: policy.tolerance,
            matcher,
        }
    }

    pub fn classify(&self, encodings: &[Vec<f64>], reference: &[f64]) -> IdentityFlags {
        let matched_any = encodings.iter().any(|candidate| {
            match self.matcher.matches(reference, candidate, self.tolerance) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!(error = %e, "Face match failed, treating as unknown");
                    false
                }
            }
        });

        IdentityFlags {
            no_face: encodings.is_empty(),
            multi_human: encodings.len() > 1,
            unknown_present: !encodings.is_empty() && !matched_any,
            matched_any,
        }
    }
}

impl std::fmt::Debug for IdentityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityMonitor")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}
