//! Jet kinematics and angular distance.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// A reconstructed jet as seen by the calibration: direction, transverse momentum and
/// an optional energy-correction factor carried alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuth (radians).
    pub phi: f64,
    /// Uncorrected transverse momentum (GeV).
    #[serde(default)]
    pub pt: f64,
    /// Jet energy correction factor, if one was stored with the jet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<f64>,
}

impl Jet {
    /// Create a jet without a stored correction.
    pub fn new(eta: f64, phi: f64, pt: f64) -> Self {
        Self { eta, phi, pt, correction: None }
    }

    /// Attach a stored correction factor.
    pub fn with_correction(mut self, factor: f64) -> Self {
        self.correction = Some(factor);
        self
    }

    /// Whether both angular coordinates are finite.
    pub fn has_finite_direction(&self) -> bool {
        self.eta.is_finite() && self.phi.is_finite()
    }

    /// Squared angular distance `(Δφ)² + (Δη)²` with Δφ wrapped into (−π, π].
    pub fn delta_r2(&self, other: &Jet) -> f64 {
        let deta = self.eta - other.eta;
        let dphi = delta_phi(self.phi, other.phi);
        deta * deta + dphi * dphi
    }
}

/// Azimuthal difference `a − b` wrapped into (−π, π].
pub fn delta_phi(a: f64, b: f64) -> f64 {
    let mut d = a - b;
    if d.abs() > PI {
        d = d.rem_euclid(2.0 * PI);
        if d > PI {
            d -= 2.0 * PI;
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_delta_phi_wraps() {
        assert_abs_diff_eq!(delta_phi(0.5, 0.25), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(PI - 0.01, -PI + 0.01), -0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(-PI + 0.01, PI - 0.01), 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(delta_phi(3.0 * PI + 0.5, 0.0), 0.5 - PI, epsilon = 1e-9);
    }

    #[test]
    fn test_delta_r2() {
        let a = Jet::new(0.0, 0.0, 40.0);
        let b = Jet::new(0.3, 0.4, 25.0);
        assert_abs_diff_eq!(a.delta_r2(&b), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(a.delta_r2(&a), 0.0);
    }

    #[test]
    fn test_jet_json_defaults() {
        let j: Jet = serde_json::from_str(r#"{"eta": 1.2, "phi": -0.4}"#).unwrap();
        assert_eq!(j.pt, 0.0);
        assert!(j.correction.is_none());
        let s = serde_json::to_string(&Jet::new(0.0, 0.0, 10.0)).unwrap();
        assert!(!s.contains("correction"));
    }
}
