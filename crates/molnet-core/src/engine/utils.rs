use crate::core::scoring::{Similarity, SimilarityFunction, SpectrumView};
use crate::engine::error::EngineError;

/// Calls the injected similarity function and validates its result.
///
/// Empty peak lists score zero without calling `similarity`. Scores outside `[0, 1]`
/// (or not finite) are reported as [`EngineError::InvalidScore`].
pub(crate) fn checked_similarity(
    similarity: &dyn SimilarityFunction,
    a: &dyn SpectrumView,
    b: &dyn SpectrumView,
    tolerance: f64,
    min_match: usize,
    context: impl FnOnce() -> String,
) -> Result<Similarity, EngineError> {
    if a.normalized_peaks().is_empty() || b.normalized_peaks().is_empty() {
        return Ok(Similarity::zero());
    }
    let result = similarity.score(a, b, tolerance, min_match);
    if !result.score.is_finite() || !(0.0..=1.0).contains(&result.score) {
        return Err(EngineError::InvalidScore {
            score: result.score,
            context: context(),
        });
    }
    Ok(result)
}
