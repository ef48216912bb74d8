//! Confusion matrix and accuracy metrics
//!
//! Rows are reference classes, columns are predicted classes:
//! `M[reference][predicted]`. Every metric is a pure function of the
//! counts and is NaN when undefined (empty matrix, empty row or column,
//! chance agreement of 1), never silently 0 or 1.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

use vegchange_core::{ChangeClass, Error, Result};

/// Square count matrix over `n` classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Array2<u64>,
}

impl Default for ConfusionMatrix {
    fn default() -> Self {
        Self::new(ChangeClass::COUNT)
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        f64::NAN
    } else {
        num as f64 / den as f64
    }
}

impl ConfusionMatrix {
    /// An all-zero `n x n` matrix
    pub fn new(n: usize) -> Self {
        Self {
            counts: Array2::zeros((n, n)),
        }
    }

    /// Wrap existing counts; the array must be square
    pub fn from_array(counts: Array2<u64>) -> Result<Self> {
        let (r, c) = counts.dim();
        if r != c {
            return Err(Error::SizeMismatch {
                er: r,
                ec: r,
                ar: r,
                ac: c,
            });
        }
        Ok(Self { counts })
    }

    /// Build from nested rows (`rows[reference][predicted]`); every row
    /// must have one entry per class
    pub fn from_rows(rows: &[Vec<u64>]) -> Result<Self> {
        let n = rows.len();
        if let Some(row) = rows.iter().find(|r| r.len() != n) {
            return Err(Error::SizeMismatch {
                er: n,
                ec: n,
                ar: n,
                ac: row.len(),
            });
        }
        let flat: Vec<u64> = rows.iter().flatten().copied().collect();
        let counts =
            Array2::from_shape_vec((n, n), flat).map_err(|e| Error::Other(e.to_string()))?;
        Self::from_array(counts)
    }

    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    /// Count one (reference, predicted) pair
    pub fn record(&mut self, reference: ChangeClass, predicted: ChangeClass) {
        self.counts[[reference.index(), predicted.index()]] += 1;
    }

    pub fn get(&self, reference: usize, predicted: usize) -> u64 {
        self.counts[[reference, predicted]]
    }

    pub fn total(&self) -> u64 {
        self.counts.sum()
    }

    pub fn trace(&self) -> u64 {
        self.counts.diag().sum()
    }

    /// Reference total for class `c`
    pub fn row_sum(&self, c: usize) -> u64 {
        self.counts.row(c).sum()
    }

    /// Predicted total for class `c`
    pub fn col_sum(&self, c: usize) -> u64 {
        self.counts.column(c).sum()
    }

    /// `trace / total`
    pub fn overall_accuracy(&self) -> f64 {
        ratio(self.trace(), self.total())
    }

    /// Row-normalized diagonal: share of reference class `c` predicted as `c`
    pub fn producers_accuracy(&self, c: usize) -> f64 {
        ratio(self.counts[[c, c]], self.row_sum(c))
    }

    /// Column-normalized diagonal: share of predicted class `c` that is `c`
    pub fn users_accuracy(&self, c: usize) -> f64 {
        ratio(self.counts[[c, c]], self.col_sum(c))
    }

    pub fn producers_accuracies(&self) -> Vec<f64> {
        (0..self.n_classes()).map(|c| self.producers_accuracy(c)).collect()
    }

    pub fn users_accuracies(&self) -> Vec<f64> {
        (0..self.n_classes()).map(|c| self.users_accuracy(c)).collect()
    }

    /// Chance agreement `P_e = sum_c row_c * col_c / total^2`
    pub fn expected_agreement(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return f64::NAN;
        }
        let t = total as f64;
        (0..self.n_classes())
            .map(|c| self.row_sum(c) as f64 * self.col_sum(c) as f64)
            .sum::<f64>()
            / (t * t)
    }

    /// Cohen's kappa `(P_o - P_e) / (1 - P_e)`
    pub fn kappa(&self) -> f64 {
        let po = self.overall_accuracy();
        let pe = self.expected_agreement();
        let denom = 1.0 - pe;
        if po.is_nan() || pe.is_nan() || denom.abs() < 1e-12 {
            return f64::NAN;
        }
        (po - pe) / denom
    }

    /// Serializable snapshot of the counts and every metric
    pub fn report(&self) -> AccuracyReport {
        AccuracyReport::from(self)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.n_classes();
        let label = |c: usize| {
            ChangeClass::from_code(c as u8)
                .map(|k| k.label().to_string())
                .unwrap_or_else(|| c.to_string())
        };
        let width = (0..n).map(|c| label(c).len()).max().unwrap_or(1).max(8);

        write!(f, "{:>width$}", "ref\\pred")?;
        for c in 0..n {
            write!(f, " {:>width$}", label(c))?;
        }
        writeln!(f)?;
        for r in 0..n {
            write!(f, "{:>width$}", label(r))?;
            for c in 0..n {
                write!(f, " {:>width$}", self.counts[[r, c]])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn defined(v: f64) -> Option<f64> {
    (!v.is_nan()).then_some(v)
}

/// Accuracy metrics for reports; undefined metrics serialize as `null`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// `matrix[reference][predicted]`
    pub matrix: Vec<Vec<u64>>,
    pub total: u64,
    pub overall_accuracy: Option<f64>,
    pub kappa: Option<f64>,
    pub producers_accuracy: Vec<Option<f64>>,
    pub users_accuracy: Vec<Option<f64>>,
}

impl From<&ConfusionMatrix> for AccuracyReport {
    fn from(m: &ConfusionMatrix) -> Self {
        Self {
            matrix: m.counts.rows().into_iter().map(|r| r.to_vec()).collect(),
            total: m.total(),
            overall_accuracy: defined(m.overall_accuracy()),
            kappa: defined(m.kappa()),
            producers_accuracy: m.producers_accuracies().into_iter().map(defined).collect(),
            users_accuracy: m.users_accuracies().into_iter().map(defined).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn matrix(rows: &[[u64; 3]; 3]) -> ConfusionMatrix {
        let rows: Vec<Vec<u64>> = rows.iter().map(|r| r.to_vec()).collect();
        ConfusionMatrix::from_rows(&rows).unwrap()
    }

    #[test]
    fn test_overall_accuracy_scenario() {
        let m = matrix(&[[8, 1, 1], [2, 7, 1], [0, 1, 9]]);
        assert_eq!(m.total(), 30);
        assert_eq!(m.trace(), 24);
        assert_relative_eq!(m.overall_accuracy(), 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_producers_and_users() {
        let m = matrix(&[[8, 1, 1], [2, 7, 1], [0, 1, 9]]);
        assert_relative_eq!(m.producers_accuracy(0), 0.8, epsilon = 1e-12);
        assert_relative_eq!(m.producers_accuracy(1), 0.7, epsilon = 1e-12);
        assert_relative_eq!(m.users_accuracy(0), 0.8, epsilon = 1e-12);
        assert_relative_eq!(m.users_accuracy(2), 9.0 / 11.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kappa_scenario() {
        let m = matrix(&[[8, 1, 1], [2, 7, 1], [0, 1, 9]]);
        // P_e = (10*10 + 10*9 + 10*11) / 900 = 1/3
        let expected = (0.8 - 1.0 / 3.0) / (1.0 - 1.0 / 3.0);
        assert_relative_eq!(m.kappa(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_kappa_perfect_agreement() {
        let m = matrix(&[[5, 0, 0], [0, 3, 0], [0, 0, 12]]);
        assert_relative_eq!(m.kappa(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.overall_accuracy(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kappa_chance_agreement() {
        // Each cell equals row_sum * col_sum / total
        let m = matrix(&[[4, 2, 2], [2, 1, 1], [2, 1, 1]]);
        assert!(m.kappa().abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_metrics_are_nan() {
        let empty = ConfusionMatrix::default();
        assert_eq!(empty.total(), 0);
        assert!(empty.overall_accuracy().is_nan());
        assert!(empty.kappa().is_nan());
        assert!(empty.producers_accuracy(0).is_nan());

        // class 1 absent from reference and prediction
        let m = matrix(&[[4, 0, 1], [0, 0, 0], [2, 0, 3]]);
        assert!(m.producers_accuracy(1).is_nan());
        assert!(m.users_accuracy(1).is_nan());
        assert!(!m.kappa().is_nan());

        // single class on both sides: P_e == 1
        let single = matrix(&[[0, 0, 0], [0, 6, 0], [0, 0, 0]]);
        assert_relative_eq!(single.overall_accuracy(), 1.0);
        assert!(single.kappa().is_nan());
    }

    #[test]
    fn test_record_pairs() {
        let mut m = ConfusionMatrix::default();
        m.record(ChangeClass::Increase, ChangeClass::Increase);
        m.record(ChangeClass::Decrease, ChangeClass::Increase);
        assert_eq!(m.get(2, 2), 1);
        assert_eq!(m.get(0, 2), 1);
        assert_eq!(m.total(), 2);
    }

    #[test]
    fn test_report_nulls() {
        let m = matrix(&[[4, 0, 1], [0, 0, 0], [2, 0, 3]]);
        let report = m.report();
        assert_eq!(report.producers_accuracy[1], None);
        assert_eq!(report.matrix[2], vec![2, 0, 3]);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["users_accuracy"][1].is_null());
    }

    #[test]
    fn test_non_square_rejected() {
        assert!(ConfusionMatrix::from_array(Array2::zeros((2, 3))).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        // Nine counts would fit a 3x3 shape, the rows do not
        let rows = vec![vec![1, 2, 3, 4], vec![5, 6], vec![7, 8, 9]];
        let err = ConfusionMatrix::from_rows(&rows).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { ac: 4, .. }));
        assert!(ConfusionMatrix::from_rows(&[vec![1, 2], vec![3]]).is_err());
    }

    #[test]
    fn test_display_has_labels() {
        let m = matrix(&[[1, 0, 0], [0, 1, 0], [0, 0, 1]]);
        let text = m.to_string();
        assert!(text.contains("no change"));
        assert_eq!(text.lines().count(), 4);
    }
}
