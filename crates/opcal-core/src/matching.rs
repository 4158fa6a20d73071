//! Nearest-candidate spatial matching in (η, φ).
//!
//! The same matcher resolves a jet's truth flavour (against the truth association
//! table) and each tagger's discriminator (against the tag collection). Matching is
//! pure: the candidate list is only read.

use crate::kinematics::Jet;

/// Default squared-distance tolerance.
///
/// Jets referenced by truth and tag products are the same physical objects, so their
/// coordinates agree up to storage precision.
pub const DEFAULT_TOLERANCE_SQ: f64 = 1e-5;

/// A successful match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<P> {
    /// Position of the matched candidate in the input sequence.
    pub index: usize,
    /// Squared angular distance to the target.
    pub distance_sq: f64,
    /// Payload carried by the matched candidate.
    pub payload: P,
}

/// Nearest-neighbour matcher with a fixed squared-distance tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMatcher {
    tolerance_sq: f64,
}

impl Default for SpatialMatcher {
    fn default() -> Self {
        Self { tolerance_sq: DEFAULT_TOLERANCE_SQ }
    }
}

impl SpatialMatcher {
    /// Create a matcher accepting candidates with `Δ² < tolerance_sq`.
    pub fn new(tolerance_sq: f64) -> Self {
        Self { tolerance_sq }
    }

    /// Squared-distance tolerance.
    pub fn tolerance_sq(&self) -> f64 {
        self.tolerance_sq
    }

    /// Whether two jets are within tolerance of each other.
    pub fn matches(&self, a: &Jet, b: &Jet) -> bool {
        a.delta_r2(b) < self.tolerance_sq
    }

    /// Find the candidate closest to `target`.
    ///
    /// Candidates with a missing jet reference or non-finite coordinates are skipped.
    /// When several candidates share the minimum distance the earliest one wins.
    /// Returns `None` when no candidate lies strictly within tolerance.
    pub fn best_match<'a, P, I>(&self, target: &Jet, candidates: I) -> Option<Match<P>>
    where
        I: IntoIterator<Item = (Option<&'a Jet>, P)>,
    {
        if !target.has_finite_direction() {
            return None;
        }
        let mut best: Option<Match<P>> = None;
        for (index, (jet, payload)) in candidates.into_iter().enumerate() {
            let Some(jet) = jet else { continue };
            if !jet.has_finite_direction() {
                continue;
            }
            let distance_sq = target.delta_r2(jet);
            if distance_sq >= self.tolerance_sq {
                continue;
            }
            let closer = best.as_ref().is_none_or(|b| distance_sq < b.distance_sq);
            if closer {
                best = Some(Match { index, distance_sq, payload });
            }
        }
        best
    }
}
