//! Accuracy assessment against labelled reference points
//!
//! - Extraction: classifier value under each point
//! - Confusion matrix: overall accuracy, kappa, producer's/user's accuracy
//! - Validation: joins the two and accounts for every dropped point

mod confusion;
mod extract;

pub use confusion::{AccuracyReport, ConfusionMatrix};
pub use extract::extract_at_points;

use serde::Serialize;
use std::collections::BTreeMap;

use vegchange_core::{ClassifiedRaster, ReferencePoint};

/// Result of [`validate`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationOutcome {
    #[serde(skip)]
    pub matrix: ConfusionMatrix,
    /// Points counted in the matrix
    pub surviving: usize,
    /// Labelled points that fell on a masked cell or off the grid
    pub outside_mask: usize,
    /// Points whose label is outside the class vocabulary
    pub unmapped_labels: usize,
    /// Points with no label at all
    pub unlabelled: usize,
    /// Distinct unmapped label strings with their counts
    pub unknown_labels: BTreeMap<String, usize>,
}

impl ValidationOutcome {
    /// Points dropped for any reason
    pub fn dropped(&self) -> usize {
        self.outside_mask + self.unmapped_labels + self.unlabelled
    }
}

/// Pair every reference label with the classifier value at its location.
///
/// A point is dropped (and counted) when its label does not map onto a
/// class or when no classifier value exists there. `surviving` always
/// equals `matrix.total()`.
pub fn validate(classified: &ClassifiedRaster, points: &[ReferencePoint]) -> ValidationOutcome {
    let predicted = extract_at_points(classified, points);
    let mut outcome = ValidationOutcome::default();

    for (point, predicted) in points.iter().zip(predicted) {
        let reference = point.reference_class();
        match (reference, predicted) {
            (Some(r), Some(p)) => {
                outcome.matrix.record(r, p);
                outcome.surviving += 1;
            }
            (Some(_), None) => outcome.outside_mask += 1,
            (None, _) => match &point.label {
                Some(label) => {
                    outcome.unmapped_labels += 1;
                    *outcome.unknown_labels.entry(label.clone()).or_default() += 1;
                }
                None => outcome.unlabelled += 1,
            },
        }
    }

    outcome
}
