//! Jet energy correction providers.
//!
//! The correction lookup itself lives outside the calibration; the driver only asks
//! for a multiplicative factor per jet.

use crate::kinematics::Jet;

/// Source of per-jet multiplicative pT corrections.
pub trait CorrectionProvider: Send + Sync {
    /// Correction factor for `jet`.
    fn correction(&self, jet: &Jet) -> f64;

    /// Provider name (e.g. the correction service label).
    fn name(&self) -> &str;
}

/// Corrections disabled: every factor is 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCorrection;

impl CorrectionProvider for NoCorrection {
    fn correction(&self, _jet: &Jet) -> f64 {
        1.0
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Uses the factor stored on each jet, 1 when absent.
#[derive(Debug, Clone, Default)]
pub struct StoredCorrection {
    label: String,
}

impl StoredCorrection {
    /// Provider reporting itself under `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl CorrectionProvider for StoredCorrection {
    fn correction(&self, jet: &Jet) -> f64 {
        jet.correction.unwrap_or(1.0)
    }

    fn name(&self) -> &str {
        &self.label
    }
}
