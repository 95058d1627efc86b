//! # Template Matching Module
//!
//! Scores a chroma vector against every template and picks the winner.

use crate::templates::ChordTemplate;
use crate::{Candidate, ChromaVector, UNKNOWN_CHORD};

/// Default score a candidate must exceed to be accepted by name.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.6;

/// Scores `chroma` against every template, best first.
///
/// The sort is stable, so equal scores keep generation order
/// (lowest root first, then formula order).
pub fn rank(chroma: &ChromaVector, templates: &[ChordTemplate]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = templates
        .iter()
        .map(|t| Candidate {
            name: t.name.clone(),
            score: t.similarity(chroma),
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

/// The chord label and confidence chosen from a ranked candidate list.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub chord: String,
    pub confidence: f32,
}

/// Accepts the top candidate if it scores strictly above `floor`.
///
/// Otherwise the chord is `"?"` and the confidence is still the top score,
/// or 0.0 when there are no candidates at all.
pub fn decide(candidates: &[Candidate], floor: f32) -> Decision {
    match candidates.first() {
        Some(best) if best.score > floor => Decision {
            chord: best.name.clone(),
            confidence: best.score,
        },
        Some(best) => Decision {
            chord: UNKNOWN_CHORD.to_string(),
            confidence: best.score,
        },
        None => Decision {
            chord: UNKNOWN_CHORD.to_string(),
            confidence: 0.0,
        },
    }
}

/// Two leading candidates that scored close to each other.
#[derive(Debug, Clone, PartialEq)]
pub struct NearTie {
    pub top: Candidate,
    pub runner_up: Candidate,
}

/// Reports the leading pair when the gap is under 30% of the top score and
/// the top score is above 0.4.
///
/// Purely informational: the decision from [`decide`] is never changed.
pub fn near_tie(candidates: &[Candidate]) -> Option<NearTie> {
    let [top, runner_up, ..] = candidates else {
        return None;
    };
    let gap = top.score - runner_up.score;
    if gap < top.score * 0.3 && top.score > 0.4 {
        Some(NearTie {
            top: top.clone(),
            runner_up: runner_up.clone(),
        })
    } else {
        None
    }
}
