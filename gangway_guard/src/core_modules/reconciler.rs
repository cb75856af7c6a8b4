// THEORY:
// People standing in the gangway change the scene just as much as a crate left
// on it does. The `PersonReconciler` takes the boxes reported by an external
// person detector and splits the frame's candidates in two: `suppressed` ones
// overlap a person and are kept only for operator visibility, `valid` ones are
// the only candidates allowed to count as blockage evidence.
//
// Two overlap tests are available. `Intersection` is the symmetric rectangle
// overlap used by default. `Legacy` reproduces the corner comparison of the
// first deployment so that old behaviour can be replayed; it is not a sound
// containment test (it accepts boxes that do not touch the person at all) and
// should only be selected deliberately.

use crate::core_modules::candidate::{BoundingBox, CandidateBox, PersonBox};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainmentTest {
    /// Person and candidate rectangles share a region of positive area.
    #[default]
    Intersection,
    /// Candidate top-left is at or below-right of the person top-left, or the
    /// candidate bottom-right is at or above-left of the person bottom-right.
    Legacy,
}

impl ContainmentTest {
    pub fn matches(&self, person: &BoundingBox, candidate: &BoundingBox) -> bool {
        match self {
            ContainmentTest::Intersection => person.intersects(candidate),
            ContainmentTest::Legacy => {
                (candidate.x1 >= person.x1 && candidate.y1 >= person.y1)
                    || (candidate.x2 <= person.x2 && candidate.y2 <= person.y2)
            }
        }
    }
}

/// Exhaustive, disjoint split of one frame's candidates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub valid: Vec<CandidateBox>,
    pub suppressed: Vec<CandidateBox>,
}

#[derive(Debug, Clone, Copy)]
pub struct PersonReconciler {
    test: ContainmentTest,
}

impl PersonReconciler {
    pub fn new(test: ContainmentTest) -> Self {
        Self { test }
    }

    pub fn reconcile(&self, candidates: Vec<CandidateBox>, persons: &[PersonBox]) -> Reconciliation {
        let (suppressed, valid): (Vec<CandidateBox>, Vec<CandidateBox>) = candidates.into_iter().partition(|candidate| {
            persons
                .iter()
                .any(|person| self.test.matches(&person.bounds, &candidate.bounds))
        });
        Reconciliation { valid, suppressed }
    }
}

/// Keeps the detections at or above `min_confidence`.
pub fn confident_persons(persons: &[PersonBox], min_confidence: f32) -> Vec<PersonBox> {
    persons
        .iter()
        .filter(|person| person.confidence >= min_confidence)
        .copied()
        .collect()
}
