//! Tagger registry: one accumulator per configured alias.

use std::collections::{BTreeMap, HashSet};

use crate::error::{Error, Result};
use crate::kinematics::Jet;
use crate::matching::SpatialMatcher;
use crate::performance::TaggerPerformance;
use crate::tags::TagCollection;
use crate::truth::Flavour;
use crate::working_point::WorkingPoint;

/// Counters for one `observe` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserveStats {
    /// Discriminators added to an accumulator.
    pub accumulated: u64,
    /// Tag collections with no tag within tolerance of the jet.
    pub unmatched: u64,
    /// Working points skipped because their producer already contributed.
    pub duplicates: u64,
}

/// Owns the per-alias accumulators and routes observations to them.
///
/// Working points are kept in configuration order for routing; accumulators are keyed
/// by alias.
#[derive(Debug, Clone)]
pub struct TaggerRegistry {
    working_points: Vec<WorkingPoint>,
    performances: BTreeMap<String, TaggerPerformance>,
}

impl TaggerRegistry {
    /// Create one empty accumulator per working point. Aliases must be unique.
    pub fn new(working_points: Vec<WorkingPoint>) -> Result<Self> {
        let mut performances = BTreeMap::new();
        for wp in &working_points {
            if performances
                .insert(wp.alias().to_string(), TaggerPerformance::for_working_point(wp))
                .is_some()
            {
                return Err(Error::Config(format!("duplicate tagger alias '{}'", wp.alias())));
            }
        }
        Ok(Self { working_points, performances })
    }

    /// Registry with the same working points and empty accumulators.
    pub fn empty_like(&self) -> Self {
        let performances =
            self.performances.iter().map(|(k, p)| (k.clone(), p.empty_like())).collect();
        Self { working_points: self.working_points.clone(), performances }
    }

    /// Working points in configuration order.
    pub fn working_points(&self) -> &[WorkingPoint] {
        &self.working_points
    }

    /// Accumulator for `alias`.
    pub fn performance(&self, alias: &str) -> Option<&TaggerPerformance> {
        self.performances.get(alias)
    }

    /// Accumulators ordered by alias.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaggerPerformance)> {
        self.performances.iter().map(|(k, p)| (k.as_str(), p))
    }

    /// Record one jet of known flavour against every configured tagger.
    ///
    /// `tags` resolves a working point's source to the event's collection. Each producing
    /// module contributes at most once per jet: the module is claimed by the first
    /// working point that references it, whether or not a tag matches.
    pub fn observe<'e, F>(
        &mut self,
        jet: &Jet,
        flavour: Flavour,
        mut tags: F,
        matcher: &SpatialMatcher,
    ) -> Result<ObserveStats>
    where
        F: FnMut(&WorkingPoint) -> Option<&'e TagCollection>,
    {
        let mut stats = ObserveStats::default();
        let mut seen_modules: HashSet<&'e str> = HashSet::new();

        for wp in &self.working_points {
            let collection = tags(wp).ok_or_else(|| {
                Error::MissingInput(format!("tag collection '{}' for {}", wp.source(), wp.alias()))
            })?;
            if !seen_modules.insert(collection.module.as_str()) {
                stats.duplicates += 1;
                continue;
            }
            let Some(discriminator) = collection.discriminator_for(jet, matcher) else {
                stats.unmatched += 1;
                continue;
            };
            let perf = self.performances.get_mut(wp.alias()).ok_or_else(|| {
                Error::IllegalState(format!("no accumulator registered for '{}'", wp.alias()))
            })?;
            perf.add(discriminator, flavour)?;
            stats.accumulated += 1;
        }
        Ok(stats)
    }

    /// Merge the accumulators of a registry built with `empty_like`.
    pub fn merge(&mut self, other: TaggerRegistry) -> Result<()> {
        for (alias, perf) in other.performances {
            let dst = self.performances.get_mut(&alias).ok_or_else(|| {
                Error::IllegalState(format!("merge: alias '{alias}' is not registered"))
            })?;
            dst.merge(perf)?;
        }
        Ok(())
    }

    /// Pair every working point with its accumulator, ordered by alias.
    pub fn into_parts(self) -> Vec<(WorkingPoint, TaggerPerformance)> {
        let mut performances = self.performances;
        let mut parts: Vec<(WorkingPoint, TaggerPerformance)> = self
            .working_points
            .into_iter()
            .filter_map(|wp| performances.remove(wp.alias()).map(|p| (wp, p)))
            .collect();
        parts.sort_by(|a, b| a.0.alias().cmp(b.0.alias()));
        parts
    }
}
