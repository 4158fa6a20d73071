//! Working-point calibration: curve inversion and fixed-cut evaluation.
//!
//! In mistag mode a named target `a` is a light-flavour acceptance. The light curve
//! is non-increasing in the cut, so the resolved cut is the smallest stored cut whose
//! light efficiency is ≤ `a`; b and c efficiencies are then read at that cut.
//! Targets outside `[last, first]` of the light curve are handled by `InversionPolicy`.

use serde::{Deserialize, Serialize};

use crate::curve::{DiscriminatorCurve, EfficiencyCurve, PerformanceCurve};
use crate::error::{Error, Result};
use crate::performance::TaggerPerformance;
use crate::truth::Flavour;
use crate::working_point::{CalibrationMode, WorkingPoint};

/// Handling of targets outside the recorded curve domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InversionPolicy {
    /// Report the target as out of range.
    #[default]
    Reject,
    /// Use the nearest edge point and flag the result as clamped.
    Clamp,
}

/// A resolved operating point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingPointResult {
    /// Operating point name.
    pub name: String,
    /// Requested value (mistag target or discriminator cut, depending on mode).
    pub target: f64,
    /// Discriminator cut the operating point corresponds to.
    pub discriminator_cut: f64,
    /// b efficiency at the cut.
    pub signal_efficiency: f64,
    /// c efficiency at the cut.
    pub charm_efficiency: f64,
    /// Realised light (udsg) efficiency at the cut.
    pub background_efficiency: f64,
    /// Whether the target was outside the recorded domain and clamped to its edge.
    pub clamped: bool,
}

/// An operating point that could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedWorkingPoint {
    /// Operating point name.
    pub name: String,
    /// Requested value.
    pub target: f64,
    /// Why it was rejected.
    pub reason: String,
}

/// The three class curves of one tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavourCurves {
    /// b-jet efficiency curve.
    pub b: EfficiencyCurve,
    /// c-jet efficiency curve.
    pub c: EfficiencyCurve,
    /// udsg-jet (mistag) efficiency curve.
    pub udsg: EfficiencyCurve,
}

impl FlavourCurves {
    /// Build all curves from a tagger's accumulator, finalizing it.
    pub fn build(perf: &mut TaggerPerformance) -> Self {
        Self {
            b: perf.build_curve(Flavour::B),
            c: perf.build_curve(Flavour::C),
            udsg: perf.build_curve(Flavour::Light),
        }
    }

    /// Curve of `flavour`.
    pub fn get(&self, flavour: Flavour) -> &EfficiencyCurve {
        match flavour {
            Flavour::B => &self.b,
            Flavour::C => &self.c,
            Flavour::Light => &self.udsg,
        }
    }

    fn result_at(&self, name: &str, target: f64, cut: f64, clamped: bool) -> WorkingPointResult {
        WorkingPointResult {
            name: name.to_string(),
            target,
            discriminator_cut: cut,
            signal_efficiency: self.b.efficiency_at(cut),
            charm_efficiency: self.c.efficiency_at(cut),
            background_efficiency: self.udsg.efficiency_at(cut),
            clamped,
        }
    }
}

/// Invert the light curve at mistag target `target`.
pub fn resolve_mistag_target(
    curves: &FlavourCurves,
    name: &str,
    target: f64,
    policy: InversionPolicy,
) -> Result<WorkingPointResult> {
    let points = &curves.udsg.points;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(Error::OutOfRange { target, lo: f64::NAN, hi: f64::NAN });
    };
    let (lo, hi) = (last.efficiency, first.efficiency);
    let clamped = !(lo..=hi).contains(&target);
    if clamped && (policy == InversionPolicy::Reject || target.is_nan()) {
        return Err(Error::OutOfRange { target, lo, hi });
    }
    let idx = if target > hi {
        0
    } else if target < lo {
        points.len() - 1
    } else {
        points.partition_point(|p| p.efficiency > target)
    };
    Ok(curves.result_at(name, target, points[idx].cut, clamped))
}

/// Evaluate all class efficiencies at discriminator cut `cut`.
pub fn evaluate_fixed_cut(
    curves: &FlavourCurves,
    name: &str,
    cut: f64,
    lo: f64,
    hi: f64,
    policy: InversionPolicy,
) -> Result<WorkingPointResult> {
    if (lo..=hi).contains(&cut) {
        return Ok(curves.result_at(name, cut, cut, false));
    }
    match policy {
        InversionPolicy::Reject => Err(Error::OutOfRange { target: cut, lo, hi }),
        InversionPolicy::Clamp => Ok(curves.result_at(name, cut, cut.clamp(lo, hi), true)),
    }
}

/// Everything reported for one tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggerReport {
    /// Alias of the tagger.
    pub alias: String,
    /// Input tag of its discriminator collection.
    pub source: String,
    /// Per-flavour efficiency curves.
    pub curves: FlavourCurves,
    /// Light efficiency → discriminator cut.
    pub discriminator: DiscriminatorCurve,
    /// Light efficiency against b efficiency.
    pub performance: PerformanceCurve,
    /// Resolved operating points, ordered by name.
    pub results: Vec<WorkingPointResult>,
    /// Operating points outside the recorded domain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedWorkingPoint>,
    /// Entries folded onto the discriminator range edges.
    pub clamped_entries: u64,
    /// Non-finite discriminators dropped.
    pub rejected_entries: u64,
}

/// Finalize `perf` and resolve every operating point of `wp`.
pub fn calibrate(
    wp: &WorkingPoint,
    perf: &mut TaggerPerformance,
    mode: CalibrationMode,
    policy: InversionPolicy,
) -> TaggerReport {
    let curves = FlavourCurves::build(perf);
    let mut results = Vec::with_capacity(wp.cuts().len());
    let mut rejected = Vec::new();

    for (name, &value) in wp.cuts() {
        let resolved = match mode {
            CalibrationMode::MistagRate => resolve_mistag_target(&curves, name, value, policy),
            CalibrationMode::DiscriminatorCut => evaluate_fixed_cut(
                &curves,
                name,
                value,
                wp.discriminator_min(),
                wp.discriminator_max(),
                policy,
            ),
        };
        match resolved {
            Ok(r) => {
                if r.clamped {
                    log::warn!(
                        "{}/{name}: target {value} clamped to cut {}",
                        wp.alias(),
                        r.discriminator_cut
                    );
                }
                results.push(r);
            }
            Err(e) => {
                log::warn!("{}/{name}: {e}", wp.alias());
                rejected.push(RejectedWorkingPoint {
                    name: name.clone(),
                    target: value,
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "{}: {} operating point(s) resolved, {} rejected (b={}, c={}, udsg={} entries)",
        wp.alias(),
        results.len(),
        rejected.len(),
        curves.b.entries,
        curves.c.entries,
        curves.udsg.entries
    );

    TaggerReport {
        alias: wp.alias().to_string(),
        source: wp.source().to_string(),
        discriminator: DiscriminatorCurve::from_curve(&curves.udsg),
        performance: PerformanceCurve::new(&curves.b, &curves.udsg),
        curves,
        results,
        rejected,
        clamped_entries: perf.clamped(),
        rejected_entries: perf.rejected(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::working_point::CurveBinning;
    use approx::assert_relative_eq;

    fn reference_curves() -> FlavourCurves {
        let mut p = TaggerPerformance::new("TC", 0.0, 1.0, CurveBinning::Exact);
        for d in [0.1, 0.5, 0.9] {
            p.add(d, Flavour::B).unwrap();
        }
        for d in [0.2, 0.3, 0.4, 0.95] {
            p.add(d, Flavour::Light).unwrap();
        }
        FlavourCurves::build(&mut p)
    }

    #[test]
    fn test_inversion_at_quarter_mistag() {
        let c = reference_curves();
        let r = resolve_mistag_target(&c, "Medium", 0.25, InversionPolicy::Reject).unwrap();
        assert_relative_eq!(r.discriminator_cut, 0.4);
        assert_relative_eq!(r.signal_efficiency, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.background_efficiency, 0.25);
        assert_eq!(r.charm_efficiency, 0.0);
        assert!(!r.clamped);
    }

    #[test]
    fn test_inversion_between_points_is_conservative() {
        let c = reference_curves();
        // 0.3 lies between the 0.5 (cut 0.3) and 0.25 (cut 0.4) steps.
        let r = resolve_mistag_target(&c, "x", 0.3, InversionPolicy::Reject).unwrap();
        assert_relative_eq!(r.discriminator_cut, 0.4);
        assert!(r.background_efficiency <= 0.3);
    }

    #[test]
    fn test_inversion_out_of_range_reject() {
        let c = reference_curves();
        let err = resolve_mistag_target(&c, "Loose", 0.9, InversionPolicy::Reject).unwrap_err();
        match err {
            Error::OutOfRange { target, lo, hi } => {
                assert_eq!(target, 0.9);
                assert_eq!(lo, 0.0);
                assert_eq!(hi, 0.75);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inversion_out_of_range_clamp() {
        let c = reference_curves();
        let r = resolve_mistag_target(&c, "Loose", 0.9, InversionPolicy::Clamp).unwrap();
        assert!(r.clamped);
        assert_relative_eq!(r.discriminator_cut, 0.2);
        assert_relative_eq!(r.background_efficiency, 0.75);
        assert_relative_eq!(r.signal_efficiency, 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inversion_on_empty_curve() {
        let mut p = TaggerPerformance::new("E", 0.0, 1.0, CurveBinning::Exact);
        let c = FlavourCurves::build(&mut p);
        for policy in [InversionPolicy::Reject, InversionPolicy::Clamp] {
            assert!(matches!(
                resolve_mistag_target(&c, "x", 0.1, policy),
                Err(Error::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_tight_target_clamps_to_last_point() {
        let mut p = TaggerPerformance::new("U", 0.0, 1.0, CurveBinning::Uniform { bins: 4 });
        for d in [0.1, 0.3, 0.6, 1.0] {
            p.add(d, Flavour::Light).unwrap();
        }
        let c = FlavourCurves::build(&mut p);
        // Grid cuts 0, 0.25, 0.5, 0.75, 1: efficiencies 1, .75, .5, .25, 0.
        let r = resolve_mistag_target(&c, "x", 0.5, InversionPolicy::Reject).unwrap();
        assert_relative_eq!(r.discriminator_cut, 0.5);
        let r = resolve_mistag_target(&c, "x", 0.0, InversionPolicy::Reject).unwrap();
        assert_relative_eq!(r.discriminator_cut, 1.0);
    }

    #[test]
    fn test_fixed_cut() {
        let c = reference_curves();
        let r = evaluate_fixed_cut(&c, "Medium", 0.4, 0.0, 1.0, InversionPolicy::Reject).unwrap();
        assert_relative_eq!(r.signal_efficiency, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(r.background_efficiency, 0.25);

        assert!(evaluate_fixed_cut(&c, "x", 1.5, 0.0, 1.0, InversionPolicy::Reject).is_err());
        let r = evaluate_fixed_cut(&c, "x", 1.5, 0.0, 1.0, InversionPolicy::Clamp).unwrap();
        assert!(r.clamped);
        assert_eq!(r.discriminator_cut, 1.0);
        assert_eq!(r.target, 1.5);
    }
}
