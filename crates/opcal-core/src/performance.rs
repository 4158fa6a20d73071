//! Per-tagger accumulation of (discriminator, flavour) pairs.
//!
//! A `TaggerPerformance` has two phases. While accumulating, `add` appends in O(1)
//! amortised time and nothing is sorted. `finalize` sorts every class once; after that
//! curves can be built any number of times and further `add` calls are rejected.

use crate::curve::EfficiencyCurve;
use crate::error::{Error, Result};
use crate::truth::Flavour;
use crate::working_point::{CurveBinning, WorkingPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Accumulating,
    Finalized,
}

/// Discriminator samples of one tagger, split by truth flavour.
#[derive(Debug, Clone)]
pub struct TaggerPerformance {
    alias: String,
    min: f64,
    max: f64,
    binning: CurveBinning,
    samples: [Vec<f64>; 3],
    clamped: u64,
    rejected: u64,
    phase: Phase,
}

impl TaggerPerformance {
    /// Create an empty accumulator for discriminators in `[min, max]`.
    pub fn new(alias: impl Into<String>, min: f64, max: f64, binning: CurveBinning) -> Self {
        Self {
            alias: alias.into(),
            min,
            max,
            binning,
            samples: Default::default(),
            clamped: 0,
            rejected: 0,
            phase: Phase::Accumulating,
        }
    }

    /// Accumulator configured from a working point.
    pub fn for_working_point(wp: &WorkingPoint) -> Self {
        Self::new(wp.alias(), wp.discriminator_min(), wp.discriminator_max(), wp.binning())
    }

    /// Empty accumulator with the same alias, range and binning.
    pub fn empty_like(&self) -> Self {
        Self::new(self.alias.clone(), self.min, self.max, self.binning)
    }

    /// Record one observation.
    ///
    /// Non-finite discriminators are counted and dropped. Values outside the range are
    /// folded onto the nearest edge.
    pub fn add(&mut self, discriminator: f64, flavour: Flavour) -> Result<()> {
        if self.phase == Phase::Finalized {
            return Err(Error::IllegalState(format!(
                "{}: add() after curves were built",
                self.alias
            )));
        }
        if !discriminator.is_finite() {
            self.rejected += 1;
            return Ok(());
        }
        let value = if discriminator < self.min || discriminator > self.max {
            self.clamped += 1;
            discriminator.clamp(self.min, self.max)
        } else {
            discriminator
        };
        self.samples[flavour.index()].push(value);
        Ok(())
    }

    /// Sort every class and close the accumulation phase. Idempotent.
    pub fn finalize(&mut self) {
        if self.phase == Phase::Finalized {
            return;
        }
        for class in &mut self.samples {
            class.sort_by(f64::total_cmp);
        }
        self.phase = Phase::Finalized;
        log::debug!(
            "{}: finalized with b={} c={} udsg={} (clamped {}, rejected {})",
            self.alias,
            self.samples[0].len(),
            self.samples[1].len(),
            self.samples[2].len(),
            self.clamped,
            self.rejected
        );
    }

    /// Finalize if needed and build the curve for `flavour`.
    pub fn build_curve(&mut self, flavour: Flavour) -> EfficiencyCurve {
        self.finalize();
        self.sorted_curve(flavour)
    }

    /// Curve for `flavour` from an already finalized accumulator.
    pub fn curve(&self, flavour: Flavour) -> Result<EfficiencyCurve> {
        if self.phase != Phase::Finalized {
            return Err(Error::IllegalState(format!(
                "{}: curve requested before finalize()",
                self.alias
            )));
        }
        Ok(self.sorted_curve(flavour))
    }

    fn sorted_curve(&self, flavour: Flavour) -> EfficiencyCurve {
        EfficiencyCurve::from_sorted(
            flavour,
            &self.samples[flavour.index()],
            self.binning,
            self.min,
            self.max,
        )
    }

    /// Append the samples of `other` (same configuration, both still accumulating).
    pub fn merge(&mut self, other: TaggerPerformance) -> Result<()> {
        if self.phase == Phase::Finalized || other.phase == Phase::Finalized {
            return Err(Error::IllegalState(format!("{}: merge() after finalize()", self.alias)));
        }
        if other.alias != self.alias
            || other.min != self.min
            || other.max != self.max
            || other.binning != self.binning
        {
            return Err(Error::IllegalState(format!(
                "cannot merge accumulator '{}' into '{}' with a different configuration",
                other.alias, self.alias
            )));
        }
        for (dst, src) in self.samples.iter_mut().zip(other.samples) {
            dst.extend(src);
        }
        self.clamped += other.clamped;
        self.rejected += other.rejected;
        Ok(())
    }

    /// Alias of the tagger.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Whether accumulation has been closed.
    pub fn is_finalized(&self) -> bool {
        self.phase == Phase::Finalized
    }

    /// Number of stored entries for `flavour`.
    pub fn entries(&self, flavour: Flavour) -> usize {
        self.samples[flavour.index()].len()
    }

    /// Number of stored entries over all flavours.
    pub fn total_entries(&self) -> usize {
        self.samples.iter().map(Vec::len).sum()
    }

    /// Entries folded onto a range edge.
    pub fn clamped(&self) -> u64 {
        self.clamped
    }

    /// Non-finite entries dropped.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
