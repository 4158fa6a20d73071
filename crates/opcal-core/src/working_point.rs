//! Tagger working-point descriptors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tags::SourceTag;

/// Placement of the cut points stored on an efficiency curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveBinning {
    /// One point per distinct recorded discriminator.
    #[default]
    Exact,
    /// `bins + 1` equally spaced cuts spanning the discriminator range.
    Uniform {
        /// Number of intervals.
        bins: usize,
    },
}

/// How the named values of a working point are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Values are target light-flavour mistag rates; the cut is derived.
    #[default]
    MistagRate,
    /// Values are discriminator cuts; efficiencies are evaluated at them.
    DiscriminatorCut,
}

impl CalibrationMode {
    /// Mode selected by the `operating_points_by_mistag_rate` flag.
    pub fn from_mistag_flag(by_mistag_rate: bool) -> Self {
        if by_mistag_rate { CalibrationMode::MistagRate } else { CalibrationMode::DiscriminatorCut }
    }
}

/// Largest accepted `Uniform` grid.
pub const MAX_UNIFORM_BINS: usize = 1_000_000;

/// One configured tagger: where its discriminators come from, the alias results are
/// reported under, its valid discriminator range, and its named operating points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingPoint {
    source: SourceTag,
    alias: String,
    discriminator_min: f64,
    discriminator_max: f64,
    binning: CurveBinning,
    cuts: BTreeMap<String, f64>,
}

impl WorkingPoint {
    /// Create a working point, validating the discriminator range and binning.
    pub fn new(
        source: SourceTag,
        alias: impl Into<String>,
        discriminator_min: f64,
        discriminator_max: f64,
        binning: CurveBinning,
        cuts: BTreeMap<String, f64>,
    ) -> Result<Self> {
        let alias = alias.into();
        if alias.trim().is_empty() {
            return Err(Error::Config(format!("working point for '{source}' has an empty alias")));
        }
        if !discriminator_min.is_finite() || !discriminator_max.is_finite() {
            return Err(Error::Config(format!("{alias}: discriminator range must be finite")));
        }
        if discriminator_min >= discriminator_max {
            return Err(Error::Config(format!(
                "{alias}: discriminator min ({discriminator_min}) must be below max ({discriminator_max})"
            )));
        }
        if let CurveBinning::Uniform { bins } = binning
            && !(1..=MAX_UNIFORM_BINS).contains(&bins)
        {
            return Err(Error::Config(format!(
                "{alias}: uniform binning needs between 1 and {MAX_UNIFORM_BINS} bins, got {bins}"
            )));
        }
        if let Some((name, v)) = cuts.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::Config(format!("{alias}: operating point '{name}' is not finite ({v})")));
        }
        Ok(Self { source, alias, discriminator_min, discriminator_max, binning, cuts })
    }

    /// Check the named values against the interpretation `mode` gives them.
    pub fn validate_for(&self, mode: CalibrationMode) -> Result<()> {
        if mode == CalibrationMode::MistagRate
            && let Some((name, v)) = self.cuts.iter().find(|(_, v)| !(0.0..=1.0).contains(*v))
        {
            return Err(Error::Config(format!(
                "{}: mistag target '{name}' = {v} is not a rate in [0, 1]",
                self.alias
            )));
        }
        Ok(())
    }

    /// Input tag of the discriminator collection.
    pub fn source(&self) -> &SourceTag {
        &self.source
    }

    /// Alias (unique key).
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Lower edge of the valid discriminator range.
    pub fn discriminator_min(&self) -> f64 {
        self.discriminator_min
    }

    /// Upper edge of the valid discriminator range.
    pub fn discriminator_max(&self) -> f64 {
        self.discriminator_max
    }

    /// Cut-point granularity.
    pub fn binning(&self) -> CurveBinning {
        self.binning
    }

    /// Named operating points, ordered by name.
    pub fn cuts(&self) -> &BTreeMap<String, f64> {
        &self.cuts
    }
}
