use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::index::{reaches, round_fmi};

use super::confusion::ConfusionMatrix;
use super::{SampleRequirement, Validity};

/// Evenly spaced FMI thresholds, `start..=end` in steps of `step`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSweep {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl Default for ThresholdSweep {
    fn default() -> Self {
        Self {
            start: 0.1,
            end: 5.0,
            step: 0.05,
        }
    }
}

impl ThresholdSweep {
    pub fn thresholds(&self) -> Vec<f64> {
        // Index multiplication, not repeated addition, so the grid does not drift
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize;
        (0..=count)
            .map(|i| round_fmi(self.start + i as f64 * self.step))
            .collect()
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let finite = self.start.is_finite() && self.end.is_finite() && self.step.is_finite();
        if finite && self.start >= 0.0 && self.end > self.start && self.step > 0.0 {
            Ok(())
        } else {
            Err(AnalysisError::Config(format!(
                "threshold sweep needs 0 <= start < end and step > 0 (got {:?})",
                self
            )))
        }
    }
}

/// One stock as seen by the ROC: its predictor and its outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub max_fmi: f64,
    pub collapsed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RocPoint {
    pub threshold: f64,
    pub tpr: f64,
    pub fpr: f64,
}

impl RocPoint {
    pub fn youden(&self) -> f64 {
        self.tpr - self.fpr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimalThreshold {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub youden_j: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    /// One point per swept threshold, in sweep order
    pub points: Vec<RocPoint>,
    pub auc: f64,
    pub optimal: OptimalThreshold,
    pub n_stocks: usize,
    pub n_collapsed: usize,
}

/// Contingency table of "max FMI reaches `threshold`" against collapse
pub fn confusion_at(observations: &[Observation], threshold: f64) -> ConfusionMatrix {
    ConfusionMatrix::from_pairs(
        observations
            .iter()
            .map(|o| (reaches(o.max_fmi, threshold), o.collapsed)),
    )
}

impl RocCurve {
    /// Build the curve over `sweep`.
    ///
    /// Returns `None` when either class is empty, since TPR or FPR would
    /// have no denominator.
    pub fn compute(observations: &[Observation], sweep: &ThresholdSweep) -> Option<Self> {
        let n_collapsed = observations.iter().filter(|o| o.collapsed).count();
        if n_collapsed == 0 || n_collapsed == observations.len() {
            return None;
        }

        let mut points = Vec::new();
        for threshold in sweep.thresholds() {
            let matrix = confusion_at(observations, threshold);
            points.push(RocPoint {
                threshold,
                tpr: matrix.sensitivity().value()?,
                fpr: matrix.false_positive_rate().value()?,
            });
        }

        let best = optimal_point(&points)?;
        let optimal = OptimalThreshold {
            threshold: best.threshold,
            sensitivity: best.tpr,
            specificity: 1.0 - best.fpr,
            youden_j: best.youden(),
        };

        Some(Self {
            auc: trapezoid_auc(&points),
            points,
            optimal,
            n_stocks: observations.len(),
            n_collapsed,
        })
    }
}

/// A ROC curve, or the reason the sample could not support one
#[derive(Debug, Clone, PartialEq)]
pub enum RocOutcome {
    Valid(RocCurve),
    Invalid {
        n_stocks: usize,
        n_collapsed: usize,
        reason: String,
    },
}

impl RocOutcome {
    pub fn evaluate(
        observations: &[Observation],
        requirement: &SampleRequirement,
        sweep: &ThresholdSweep,
    ) -> Self {
        let n_stocks = observations.len();
        let n_collapsed = observations.iter().filter(|o| o.collapsed).count();

        if let Validity::Invalid { reason } = requirement.check(n_stocks, n_collapsed) {
            return RocOutcome::Invalid {
                n_stocks,
                n_collapsed,
                reason,
            };
        }
        match RocCurve::compute(observations, sweep) {
            Some(curve) => RocOutcome::Valid(curve),
            None => RocOutcome::Invalid {
                n_stocks,
                n_collapsed,
                reason: "both collapsed and non-collapsed stocks are required".to_string(),
            },
        }
    }

    pub fn curve(&self) -> Option<&RocCurve> {
        match self {
            RocOutcome::Valid(curve) => Some(curve),
            RocOutcome::Invalid { .. } => None,
        }
    }

    pub fn validity(&self) -> Validity {
        match self {
            RocOutcome::Valid(_) => Validity::Valid,
            RocOutcome::Invalid { reason, .. } => Validity::Invalid {
                reason: reason.clone(),
            },
        }
    }

    pub fn n_stocks(&self) -> usize {
        match self {
            RocOutcome::Valid(curve) => curve.n_stocks,
            RocOutcome::Invalid { n_stocks, .. } => *n_stocks,
        }
    }

    pub fn n_collapsed(&self) -> usize {
        match self {
            RocOutcome::Valid(curve) => curve.n_collapsed,
            RocOutcome::Invalid { n_collapsed, .. } => *n_collapsed,
        }
    }
}

/// Point maximizing Youden's J; ties go to the lowest threshold
pub fn optimal_point(points: &[RocPoint]) -> Option<RocPoint> {
    let mut best: Option<RocPoint> = None;
    for point in points {
        match best {
            Some(b) if point.youden() <= b.youden() => {}
            _ => best = Some(*point),
        }
    }
    best
}

/// Area under the (FPR, TPR) curve by the trapezoid rule.
///
/// The curve is anchored at (0, 0) and (1, 1) and sorted by FPR then TPR
/// before integrating.
pub fn trapezoid_auc(points: &[RocPoint]) -> f64 {
    let mut curve: Vec<(f64, f64)> = points.iter().map(|p| (p.fpr, p.tpr)).collect();
    curve.push((0.0, 0.0));
    curve.push((1.0, 1.0));
    curve.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    curve
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(max_fmi: f64, collapsed: bool) -> Observation {
        Observation { max_fmi, collapsed }
    }

    #[test]
    fn test_sweep_grid() {
        let sweep = ThresholdSweep {
            start: 0.5,
            end: 1.5,
            step: 0.25,
        };
        assert_eq!(sweep.thresholds(), vec![0.5, 0.75, 1.0, 1.25, 1.5]);
        let default = ThresholdSweep::default().thresholds();
        assert_eq!(default.len(), 99);
        assert!(default.contains(&1.25));
        assert!(default.contains(&0.75));
    }

    #[test]
    fn test_sweep_validation() {
        assert!(ThresholdSweep::default().validate().is_ok());
        let bad = ThresholdSweep {
            start: 1.0,
            end: 0.5,
            step: 0.1,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_perfect_separation() {
        let observations = vec![
            obs(0.3, false),
            obs(0.6, false),
            obs(0.9, false),
            obs(1.6, true),
            obs(2.4, true),
        ];
        let curve = RocCurve::compute(&observations, &ThresholdSweep::default()).unwrap();

        assert!((curve.auc - 1.0).abs() < 1e-12);
        assert_eq!(curve.optimal.sensitivity, 1.0);
        assert_eq!(curve.optimal.specificity, 1.0);
        assert!(curve.optimal.threshold > 0.9 && curve.optimal.threshold <= 1.6);
        assert_eq!(curve.n_collapsed, 2);
    }

    #[test]
    fn test_single_class_has_no_curve() {
        let observations = vec![obs(0.3, false), obs(1.3, false)];
        assert!(RocCurve::compute(&observations, &ThresholdSweep::default()).is_none());
    }

    #[test]
    fn test_uninformative_predictor_auc_half() {
        let observations = vec![
            obs(1.0, true),
            obs(1.0, false),
            obs(2.0, true),
            obs(2.0, false),
        ];
        let curve = RocCurve::compute(&observations, &ThresholdSweep::default()).unwrap();
        assert!((curve.auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_youden_optimum_dominates_sweep() {
        let observations = vec![
            obs(0.4, false),
            obs(0.8, true),
            obs(1.1, false),
            obs(1.3, true),
            obs(1.9, false),
            obs(2.2, true),
            obs(3.0, true),
        ];
        let curve = RocCurve::compute(&observations, &ThresholdSweep::default()).unwrap();
        for point in &curve.points {
            assert!(curve.optimal.youden_j >= point.youden() - 1e-12);
        }
    }

    #[test]
    fn test_youden_ties_take_lowest_threshold() {
        let points = vec![
            RocPoint { threshold: 0.5, tpr: 0.8, fpr: 0.3 },
            RocPoint { threshold: 1.0, tpr: 0.7, fpr: 0.2 },
            RocPoint { threshold: 1.5, tpr: 0.4, fpr: 0.1 },
        ];
        assert_eq!(optimal_point(&points).unwrap().threshold, 0.5);
    }

    #[test]
    fn test_undersized_sample_is_invalid() {
        let observations = vec![obs(0.3, false), obs(1.6, true), obs(2.4, true)];
        let outcome = RocOutcome::evaluate(
            &observations,
            &SampleRequirement::new(10, 3),
            &ThresholdSweep::default(),
        );
        assert!(outcome.curve().is_none());
        assert_eq!(outcome.n_stocks(), 3);
        assert_eq!(outcome.n_collapsed(), 2);
        assert!(!outcome.validity().is_valid());
    }

    #[test]
    fn test_auc_converges_to_rank_statistic() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let observations: Vec<Observation> = (0..200)
            .map(|_| {
                let collapsed = rng.gen_bool(0.4);
                let shift = if collapsed { 0.6 } else { 0.0 };
                obs(0.2 + shift + rng.gen_range(0.0..2.0), collapsed)
            })
            .collect();

        // Probability a collapsed stock outranks a non-collapsed one
        let (pos, neg): (Vec<&Observation>, Vec<&Observation>) = observations.iter().partition(|o| o.collapsed);
        let mut wins = 0.0;
        for p in &pos {
            for n in &neg {
                if p.max_fmi > n.max_fmi {
                    wins += 1.0;
                } else if p.max_fmi == n.max_fmi {
                    wins += 0.5;
                }
            }
        }
        let rank_auc = wins / (pos.len() * neg.len()) as f64;

        for (step, tolerance) in [(0.01, 0.02), (0.001, 0.005)] {
            let sweep = ThresholdSweep { start: 0.1, end: 3.0, step };
            let auc = RocCurve::compute(&observations, &sweep).unwrap().auc;
            assert!((auc - rank_auc).abs() < tolerance, "step {}: {} vs {}", step, auc, rank_auc);
        }
    }

    #[test]
    fn test_confusion_at_danger_threshold() {
        let observations = vec![obs(1.5, true), obs(0.5, false), obs(1.25, false), obs(1.0, true)];
        assert_eq!(
            confusion_at(&observations, 1.25),
            ConfusionMatrix::new(1, 1, 1, 1)
        );
    }
}
