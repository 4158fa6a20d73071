//! Per-event orchestration and end-of-run finalization.
//!
//! Each event goes through `FetchInputs → FilterObjects → ResolveTruth → ResolveTags →
//! Accumulate`. Every input is fetched before anything is accumulated, so an event with
//! a missing product is skipped as a whole and never half-counted.

use std::collections::HashMap;
use std::ops::AddAssign;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calibration::{InversionPolicy, TaggerReport, calibrate};
use crate::config::{CalibrationConfig, JetCuts};
use crate::correction::{CorrectionProvider, NoCorrection, StoredCorrection};
use crate::error::{Error, Result};
use crate::event::EventRecord;
use crate::kinematics::Jet;
use crate::matching::SpatialMatcher;
use crate::registry::TaggerRegistry;
use crate::tags::TagCollection;
use crate::truth::{TruthAssociation, TruthLabel};
use crate::working_point::CalibrationMode;

/// Run-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Events fully processed.
    pub events_processed: u64,
    /// Events skipped because an input was missing.
    pub events_failed: u64,
    /// Jets read.
    pub jets_seen: u64,
    /// Jets passing the quality cuts.
    pub jets_selected: u64,
    /// Selected jets matched to a parton outside b/c/udsg.
    pub jets_unlabelled: u64,
    /// Selected jets without a truth match.
    pub jets_unmatched: u64,
    /// Discriminators accumulated over all taggers.
    pub observations: u64,
    /// (jet, tagger) pairs with no tag within tolerance.
    pub tags_unmatched: u64,
    /// (jet, tagger) pairs skipped because the producer already contributed.
    pub duplicate_sources: u64,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, o: RunStats) {
        self.events_processed += o.events_processed;
        self.events_failed += o.events_failed;
        self.jets_seen += o.jets_seen;
        self.jets_selected += o.jets_selected;
        self.jets_unlabelled += o.jets_unlabelled;
        self.jets_unmatched += o.jets_unmatched;
        self.observations += o.observations;
        self.tags_unmatched += o.tags_unmatched;
        self.duplicate_sources += o.duplicate_sources;
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// All inputs present; jets were processed.
    Processed {
        /// Jets passing the quality cuts.
        selected: u64,
        /// Discriminators accumulated.
        accumulated: u64,
    },
    /// An input was missing; nothing was accumulated.
    Skipped {
        /// Description of the missing input.
        reason: String,
    },
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Interpretation of the operating-point values.
    pub mode: CalibrationMode,
    /// Out-of-range policy in effect.
    pub policy: InversionPolicy,
    /// Run counters.
    pub stats: RunStats,
    /// Per-tagger results ordered by alias.
    pub taggers: Vec<TaggerReport>,
}

impl CalibrationReport {
    /// Report of `alias`.
    pub fn tagger(&self, alias: &str) -> Option<&TaggerReport> {
        self.taggers.iter().find(|t| t.alias == alias)
    }
}

/// Products of one event; tag collections keyed by alias.
struct Inputs<'a, 'e> {
    jets: &'e [Jet],
    truth: &'e TruthAssociation,
    tags: HashMap<&'a str, &'e TagCollection>,
}

/// Read-only part of the driver shared by all workers.
struct Selection {
    cuts: JetCuts,
    matcher: SpatialMatcher,
    corrector: Box<dyn CorrectionProvider>,
    jets_label: String,
    truth_label: String,
    /// `(alias, input tag)` per configured tagger.
    sources: Vec<(String, String)>,
}

impl Selection {
    fn fetch<'a, 'e, E: EventRecord + ?Sized>(&'a self, event: &'e E) -> Result<Inputs<'a, 'e>> {
        let jets = event
            .jets()
            .ok_or_else(|| Error::MissingInput(format!("jet collection '{}'", self.jets_label)))?;
        let truth = event.truth().ok_or_else(|| {
            Error::MissingInput(format!("flavour association '{}'", self.truth_label))
        })?;
        let mut tags = HashMap::with_capacity(self.sources.len());
        for (alias, source) in &self.sources {
            let coll = event.tag_collection(source).ok_or_else(|| {
                Error::MissingInput(format!("tag collection '{source}' for {alias}"))
            })?;
            tags.insert(alias.as_str(), coll);
        }
        Ok(Inputs { jets, truth, tags })
    }

    fn passes_cuts(&self, jet: &Jet) -> bool {
        let corrected_pt = jet.pt * self.corrector.correction(jet);
        jet.has_finite_direction()
            && corrected_pt.is_finite()
            && corrected_pt > self.cuts.min_pt
            && jet.eta.abs() < self.cuts.max_eta
    }

    fn process<E: EventRecord + ?Sized>(
        &self,
        registry: &mut TaggerRegistry,
        stats: &mut RunStats,
        event: &E,
    ) -> Result<EventOutcome> {
        let inputs = match self.fetch(event) {
            Ok(inputs) => inputs,
            Err(Error::MissingInput(reason)) => {
                match event.id() {
                    Some(id) => log::warn!("skipping event {id}: missing {reason}"),
                    None => log::warn!("skipping event: missing {reason}"),
                }
                stats.events_failed += 1;
                return Ok(EventOutcome::Skipped { reason });
            }
            Err(e) => return Err(e),
        };

        let mut selected = 0;
        let mut accumulated = 0;
        for jet in inputs.jets {
            stats.jets_seen += 1;
            if !self.passes_cuts(jet) {
                continue;
            }
            selected += 1;

            let flavour = match inputs.truth.resolve(jet, &self.matcher) {
                TruthLabel::Flavour(f) => f,
                TruthLabel::Unlabelled => {
                    stats.jets_unlabelled += 1;
                    continue;
                }
                TruthLabel::Unmatched => {
                    stats.jets_unmatched += 1;
                    continue;
                }
            };
            log::debug!("jet pt={} eta={} phi={} flavour={flavour}", jet.pt, jet.eta, jet.phi);

            let obs = registry.observe(
                jet,
                flavour,
                |wp| inputs.tags.get(wp.alias()).copied(),
                &self.matcher,
            )?;
            accumulated += obs.accumulated;
            stats.tags_unmatched += obs.unmatched;
            stats.duplicate_sources += obs.duplicates;
        }

        stats.jets_selected += selected;
        stats.observations += accumulated;
        stats.events_processed += 1;
        Ok(EventOutcome::Processed { selected, accumulated })
    }
}

/// Drives a calibration run: owns the tagger registry and the run counters.
pub struct CalibrationDriver {
    mode: CalibrationMode,
    policy: InversionPolicy,
    selection: Selection,
    registry: TaggerRegistry,
    stats: RunStats,
}

impl CalibrationDriver {
    /// Driver for `config` using `corrector` for jet pT corrections.
    pub fn new(config: &CalibrationConfig, corrector: Box<dyn CorrectionProvider>) -> Result<Self> {
        config.validate()?;
        let working_points = config.working_points()?;
        let sources = working_points
            .iter()
            .map(|wp| (wp.alias().to_string(), wp.source().to_string()))
            .collect();
        let registry = TaggerRegistry::new(working_points)?;
        log::info!(
            "calibration driver: {} tagger(s), mode {:?}, policy {:?}, corrections '{}'",
            config.operating_points.len(),
            config.mode(),
            config.inversion_policy,
            corrector.name()
        );
        let selection = Selection {
            cuts: config.jet_cuts,
            matcher: config.matcher(),
            corrector,
            jets_label: config.jets.clone(),
            truth_label: config.flavour_source.clone(),
            sources,
        };
        Ok(Self {
            mode: config.mode(),
            policy: config.inversion_policy,
            selection,
            registry,
            stats: RunStats::default(),
        })
    }

    /// Driver whose corrections follow `apply_jet_corrections`: factors stored on the
    /// jets when enabled, 1 otherwise.
    pub fn from_config(config: &CalibrationConfig) -> Result<Self> {
        let corrector: Box<dyn CorrectionProvider> = if config.apply_jet_corrections {
            let label = config.jet_corrections_label.clone().unwrap_or_else(|| "stored".into());
            Box::new(StoredCorrection::new(label))
        } else {
            Box::new(NoCorrection)
        };
        Self::new(config, corrector)
    }

    /// Process one event.
    ///
    /// A missing input skips the event (`Ok(Skipped)`); only contract violations return
    /// an error.
    pub fn process_event<E: EventRecord + ?Sized>(&mut self, event: &E) -> Result<EventOutcome> {
        self.selection.process(&mut self.registry, &mut self.stats, event)
    }

    /// Process events in order.
    pub fn process_events<'a, E, I>(&mut self, events: I) -> Result<()>
    where
        E: EventRecord + 'a,
        I: IntoIterator<Item = &'a E>,
    {
        for event in events {
            self.process_event(event)?;
        }
        Ok(())
    }

    /// Process `events` on `threads` workers (0 = rayon default).
    ///
    /// Events are split into contiguous chunks; each chunk accumulates into its own
    /// registry, and the partial registries are merged in chunk order. Curves are only
    /// sorted at finalization, so the report equals the sequential one.
    pub fn process_parallel<E>(&mut self, events: &[E], threads: usize) -> Result<()>
    where
        E: EventRecord + Sync,
    {
        if events.is_empty() {
            return Ok(());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| Error::Config(format!("failed to build thread pool: {e}")))?;
        let workers = pool.current_num_threads().max(1);
        let chunk = events.len().div_ceil(workers);

        let partials: Vec<(TaggerRegistry, RunStats)> = {
            let selection = &self.selection;
            let template = &self.registry;
            pool.install(|| {
                events
                    .par_chunks(chunk)
                    .map(|batch| -> Result<(TaggerRegistry, RunStats)> {
                        let mut registry = template.empty_like();
                        let mut stats = RunStats::default();
                        for event in batch {
                            selection.process(&mut registry, &mut stats, event)?;
                        }
                        Ok((registry, stats))
                    })
                    .collect::<Result<Vec<_>>>()
            })?
        };

        log::debug!("merging {} partial registries", partials.len());
        for (registry, stats) in partials {
            self.registry.merge(registry)?;
            self.stats += stats;
        }
        Ok(())
    }

    /// Counters so far.
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Tagger registry.
    pub fn registry(&self) -> &TaggerRegistry {
        &self.registry
    }

    /// Close accumulation, build curves and resolve every operating point.
    pub fn finalize(self) -> CalibrationReport {
        let stats = self.stats;
        log::info!(
            "finalizing: {} event(s) processed, {} failed, {} observation(s)",
            stats.events_processed,
            stats.events_failed,
            stats.observations
        );
        let taggers = self
            .registry
            .into_parts()
            .into_iter()
            .map(|(wp, mut perf)| calibrate(&wp, &mut perf, self.mode, self.policy))
            .collect();
        CalibrationReport { mode: self.mode, policy: self.policy, stats, taggers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::tags::TagObservation;
    use crate::truth::{Flavour, TruthEntry};

    const CONFIG: &str = r#"
jets: jets
jet_cuts: { min_pt: 30.0, max_eta: 2.4 }
operating_points:
  - collection: tc
    alias: TC
    min_discriminator: 0.0
    max_discriminator: 1.0
    points: [{ name: Medium, cut: 0.25 }]
"#;

    fn driver(apply_corrections: bool) -> CalibrationDriver {
        let mut cfg = CalibrationConfig::from_yaml_str(CONFIG).unwrap();
        cfg.apply_jet_corrections = apply_corrections;
        CalibrationDriver::from_config(&cfg).unwrap()
    }

    fn event(jets: &[(Jet, i32, f64)]) -> Event {
        let truth = jets.iter().map(|&(jet, pdg_id, _)| TruthEntry { jet, pdg_id }).collect();
        let tags = jets.iter().map(|&(jet, _, d)| TagObservation::new(jet, d)).collect();
        Event {
            id: None,
            jets: Some(jets.iter().map(|j| j.0).collect()),
            truth: Some(truth),
            tags: [("tc".to_string(), TagCollection::new("tc", tags))].into_iter().collect(),
        }
    }

    #[test]
    fn test_quality_cuts() {
        let mut d = driver(false);
        let ev = event(&[
            (Jet::new(0.0, 0.0, 30.0), 5, 0.5),  // pt at threshold: dropped
            (Jet::new(2.4, 1.0, 80.0), 5, 0.5),  // |eta| at threshold: dropped
            (Jet::new(-1.0, 2.0, 31.0), 5, 0.5), // kept
        ]);
        let out = d.process_event(&ev).unwrap();
        assert_eq!(out, EventOutcome::Processed { selected: 1, accumulated: 1 });
        assert_eq!(d.stats().jets_seen, 3);
        assert_eq!(d.registry().performance("TC").unwrap().entries(Flavour::B), 1);
    }

    #[test]
    fn test_correction_applied_before_pt_cut() {
        let jet = Jet::new(0.0, 0.0, 25.0).with_correction(1.5);
        let ev = event(&[(jet, 21, 0.1)]);

        let mut plain = driver(false);
        plain.process_event(&ev).unwrap();
        assert_eq!(plain.stats().jets_selected, 0);

        let mut corrected = driver(true);
        corrected.process_event(&ev).unwrap();
        assert_eq!(corrected.stats().jets_selected, 1);
        assert_eq!(corrected.registry().performance("TC").unwrap().entries(Flavour::Light), 1);
    }

    #[test]
    fn test_missing_input_skips_event() {
        let mut d = driver(false);
        let mut ev = event(&[(Jet::new(0.0, 0.0, 50.0), 5, 0.5)]);
        ev.tags.clear();
        let out = d.process_event(&ev).unwrap();
        assert!(matches!(out, EventOutcome::Skipped { .. }));

        let mut no_truth = event(&[(Jet::new(0.0, 0.0, 50.0), 5, 0.5)]);
        no_truth.truth = None;
        d.process_event(&no_truth).unwrap();

        let stats = d.stats();
        assert_eq!(stats.events_failed, 2);
        assert_eq!(stats.events_processed, 0);
        assert_eq!(stats.jets_seen, 0);
        assert_eq!(d.registry().performance("TC").unwrap().total_entries(), 0);
    }

    #[test]
    fn test_unlabelled_and_unmatched_truth() {
        let mut d = driver(false);
        let mut ev = event(&[(Jet::new(0.0, 0.0, 50.0), 0, 0.5), (Jet::new(1.0, 1.0, 50.0), 4, 0.7)]);
        if let Some(truth) = ev.truth.as_mut() {
            *truth = TruthAssociation::new(vec![TruthEntry { jet: Jet::new(0.0, 0.0, 50.0), pdg_id: 0 }]);
        }
        d.process_event(&ev).unwrap();
        let stats = d.stats();
        assert_eq!(stats.jets_unlabelled, 1);
        assert_eq!(stats.jets_unmatched, 1);
        assert_eq!(stats.observations, 0);
    }
}
