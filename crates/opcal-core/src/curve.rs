//! Efficiency curves derived from sorted discriminator samples.
//!
//! Efficiency at cut `c` is the fraction of a class's entries with discriminator
//! strictly above `c`. As a function of `c` this is a right-continuous, non-increasing
//! step function.

use serde::{Deserialize, Serialize};

use crate::truth::Flavour;
use crate::working_point::CurveBinning;

/// One stored point of an efficiency curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Discriminator cut.
    pub cut: f64,
    /// Fraction of entries with discriminator > `cut`.
    pub efficiency: f64,
    /// Binomial uncertainty `sqrt(e (1 − e) / N)`.
    pub error: f64,
}

/// Efficiency-vs-cut curve for one flavour of one tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyCurve {
    /// Flavour the curve describes.
    pub flavour: Flavour,
    /// Number of entries the curve was built from.
    pub entries: usize,
    /// Points ordered by ascending cut.
    pub points: Vec<CurvePoint>,
}

impl EfficiencyCurve {
    /// Build a curve from discriminators sorted in ascending order.
    ///
    /// With `Exact` binning a point is stored at every distinct value; with `Uniform`
    /// binning points sit on the grid `lo + k (hi − lo) / bins`.
    pub fn from_sorted(
        flavour: Flavour,
        sorted: &[f64],
        binning: CurveBinning,
        lo: f64,
        hi: f64,
    ) -> Self {
        let n = sorted.len();
        let mut points = Vec::new();
        if n > 0 {
            match binning {
                CurveBinning::Exact => {
                    let mut i = 0;
                    while i < n {
                        let cut = sorted[i];
                        let mut j = i + 1;
                        while j < n && sorted[j] <= cut {
                            j += 1;
                        }
                        points.push(point(cut, n - j, n));
                        i = j;
                    }
                }
                CurveBinning::Uniform { bins } => {
                    let width = (hi - lo) / bins as f64;
                    points.reserve(bins + 1);
                    for k in 0..=bins {
                        let cut = if k == bins { hi } else { lo + k as f64 * width };
                        let passing = n - sorted.partition_point(|&d| d <= cut);
                        points.push(point(cut, passing, n));
                    }
                }
            }
        }
        Self { flavour, entries: n, points }
    }

    /// Whether the curve holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Efficiency at an arbitrary cut.
    ///
    /// Uses the nearest stored cut ≤ `cut`. Below the first stored cut every entry
    /// passes; an empty curve evaluates to 0.
    pub fn efficiency_at(&self, cut: f64) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        let idx = self.points.partition_point(|p| p.cut <= cut);
        if idx == 0 { 1.0 } else { self.points[idx - 1].efficiency }
    }

    /// First stored point (loosest cut).
    pub fn first(&self) -> Option<&CurvePoint> {
        self.points.first()
    }

    /// Last stored point (tightest cut).
    pub fn last(&self) -> Option<&CurvePoint> {
        self.points.last()
    }
}

fn point(cut: f64, passing: usize, total: usize) -> CurvePoint {
    let n = total as f64;
    let efficiency = passing as f64 / n;
    let error = (efficiency * (1.0 - efficiency) / n).max(0.0).sqrt();
    CurvePoint { cut, efficiency, error }
}

/// Background efficiency → discriminator cut relation, sorted by efficiency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscriminatorCurve {
    /// Flavour whose efficiency is the independent variable.
    pub flavour: Flavour,
    /// `(efficiency, cut)` pairs, ascending in efficiency, then in cut.
    pub points: Vec<(f64, f64)>,
}

impl DiscriminatorCurve {
    /// Swap the axes of `curve`.
    pub fn from_curve(curve: &EfficiencyCurve) -> Self {
        let mut points: Vec<(f64, f64)> =
            curve.points.iter().map(|p| (p.efficiency, p.cut)).collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        Self { flavour: curve.flavour, points }
    }
}

/// One point of a background-vs-signal performance curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePoint {
    /// Discriminator cut.
    pub cut: f64,
    /// Background (light) efficiency at the cut.
    pub background_efficiency: f64,
    /// Signal (b) efficiency at the cut.
    pub signal_efficiency: f64,
}

/// Background acceptance against signal efficiency, one point per background cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCurve {
    /// Points ordered by ascending cut.
    pub points: Vec<PerformancePoint>,
}

impl PerformanceCurve {
    /// Evaluate `signal` at every stored cut of `background`.
    pub fn new(signal: &EfficiencyCurve, background: &EfficiencyCurve) -> Self {
        let points = background
            .points
            .iter()
            .map(|p| PerformancePoint {
                cut: p.cut,
                background_efficiency: p.efficiency,
                signal_efficiency: signal.efficiency_at(p.cut),
            })
            .collect();
        Self { points }
    }
}
