//! Calibration configuration (YAML or JSON) and its validation.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calibration::InversionPolicy;
use crate::error::{Error, Result};
use crate::matching::{DEFAULT_TOLERANCE_SQ, SpatialMatcher};
use crate::tags::SourceTag;
use crate::working_point::{CalibrationMode, CurveBinning, WorkingPoint};

/// Jet quality cuts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JetCuts {
    /// Jets with corrected pT at or below this value are dropped (GeV).
    pub min_pt: f64,
    /// Jets with |η| at or above this value are dropped.
    pub max_eta: f64,
}

/// One named operating point of a tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperatingPointConfig {
    /// Operating point name (e.g. `Loose`).
    pub name: String,
    /// Mistag target or discriminator cut, depending on the calibration mode.
    pub cut: f64,
}

/// One tagger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaggerConfig {
    /// Input tag of the discriminator collection.
    pub collection: SourceTag,
    /// Unique alias results are reported under.
    pub alias: String,
    /// Lower edge of the valid discriminator range.
    pub min_discriminator: f64,
    /// Upper edge of the valid discriminator range.
    pub max_discriminator: f64,
    /// Uniform cut grid size; exact cut points when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bins: Option<usize>,
    /// Named operating points.
    pub points: Vec<OperatingPointConfig>,
}

/// Top-level configuration, supplied once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalibrationConfig {
    /// Label of the jet collection (used in diagnostics).
    pub jets: String,
    /// Label of the flavour association (used in diagnostics).
    #[serde(default = "default_flavour_source")]
    pub flavour_source: String,
    /// Jet quality cuts.
    pub jet_cuts: JetCuts,
    /// Apply jet energy corrections before the pT cut.
    #[serde(default)]
    pub apply_jet_corrections: bool,
    /// Label of the correction service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jet_corrections_label: Option<String>,
    /// `true`: operating points are mistag targets; `false`: discriminator cuts.
    #[serde(default = "default_true")]
    pub operating_points_by_mistag_rate: bool,
    /// Out-of-range handling for operating points.
    #[serde(default)]
    pub inversion_policy: InversionPolicy,
    /// Squared (η, φ) distance tolerance for matching.
    #[serde(default = "default_tolerance")]
    pub matching_tolerance: f64,
    /// Configured taggers.
    pub operating_points: Vec<TaggerConfig>,
}

fn default_flavour_source() -> String {
    "flavourByValue".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE_SQ
}

impl CalibrationConfig {
    /// Read and validate a configuration file. JSON is accepted as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_yaml_str(&text)?;
        log::debug!(
            "loaded configuration '{}' with {} tagger(s)",
            path.display(),
            cfg.operating_points.len()
        );
        Ok(cfg)
    }

    /// Parse and validate a configuration document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: CalibrationConfig = serde_yaml_ng::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Calibration mode selected by `operating_points_by_mistag_rate`.
    pub fn mode(&self) -> CalibrationMode {
        CalibrationMode::from_mistag_flag(self.operating_points_by_mistag_rate)
    }

    /// Matcher built from `matching_tolerance`.
    pub fn matcher(&self) -> SpatialMatcher {
        SpatialMatcher::new(self.matching_tolerance)
    }

    /// Check every field; the first violation is returned.
    pub fn validate(&self) -> Result<()> {
        if self.jets.trim().is_empty() {
            return Err(Error::Config("'jets' must name a jet collection".into()));
        }
        if !(self.matching_tolerance.is_finite() && self.matching_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "matching_tolerance must be a positive number, got {}",
                self.matching_tolerance
            )));
        }
        let JetCuts { min_pt, max_eta } = self.jet_cuts;
        if !(min_pt.is_finite() && min_pt >= 0.0) {
            return Err(Error::Config(format!("jet_cuts.min_pt must be >= 0, got {min_pt}")));
        }
        if !(max_eta.is_finite() && max_eta > 0.0) {
            return Err(Error::Config(format!("jet_cuts.max_eta must be > 0, got {max_eta}")));
        }
        if self.operating_points.is_empty() {
            return Err(Error::Config("operating_points must list at least one tagger".into()));
        }
        let mut aliases = HashSet::new();
        for tagger in &self.operating_points {
            if !aliases.insert(tagger.alias.as_str()) {
                return Err(Error::Config(format!("duplicate tagger alias '{}'", tagger.alias)));
            }
            tagger.working_point()?.validate_for(self.mode())?;
        }
        Ok(())
    }

    /// Working points in configuration order.
    pub fn working_points(&self) -> Result<Vec<WorkingPoint>> {
        self.operating_points.iter().map(TaggerConfig::working_point).collect()
    }
}

impl TaggerConfig {
    /// Convert into a validated working point.
    pub fn working_point(&self) -> Result<WorkingPoint> {
        if self.points.is_empty() {
            return Err(Error::Config(format!("{}: no operating points configured", self.alias)));
        }
        let mut cuts = BTreeMap::new();
        for p in &self.points {
            if p.name.trim().is_empty() {
                return Err(Error::Config(format!("{}: operating point with empty name", self.alias)));
            }
            if cuts.insert(p.name.clone(), p.cut).is_some() {
                return Err(Error::Config(format!(
                    "{}: duplicate operating point '{}'",
                    self.alias, p.name
                )));
            }
        }
        let binning = match self.bins {
            Some(bins) => CurveBinning::Uniform { bins },
            None => CurveBinning::Exact,
        };
        WorkingPoint::new(
            self.collection.clone(),
            self.alias.clone(),
            self.min_discriminator,
            self.max_discriminator,
            binning,
            cuts,
        )
    }
}
