//! Truth flavour labels and the per-event jet → parton association.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kinematics::Jet;
use crate::matching::SpatialMatcher;

/// Truth flavour classes used by the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavour {
    /// b-quark jets (signal).
    B,
    /// c-quark jets.
    C,
    /// u/d/s-quark and gluon jets (background / mistag).
    #[serde(rename = "udsg")]
    Light,
}

impl Flavour {
    /// All flavours, in report order.
    pub const ALL: [Flavour; 3] = [Flavour::B, Flavour::C, Flavour::Light];

    /// Map a matched parton PDG id to a flavour class.
    ///
    /// The sign is ignored. Ids outside {1, 2, 3, 4, 5, 21} carry no label.
    pub fn from_pdg_id(pdg_id: i32) -> Option<Flavour> {
        match pdg_id.unsigned_abs() {
            5 => Some(Flavour::B),
            4 => Some(Flavour::C),
            1 | 2 | 3 | 21 => Some(Flavour::Light),
            _ => None,
        }
    }

    /// Dense index in `[0, 3)`.
    pub fn index(self) -> usize {
        match self {
            Flavour::B => 0,
            Flavour::C => 1,
            Flavour::Light => 2,
        }
    }

    /// Short label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Flavour::B => "b",
            Flavour::C => "c",
            Flavour::Light => "udsg",
        }
    }
}

impl fmt::Display for Flavour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry of the truth association: a jet and the PDG id of its matched parton.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthEntry {
    /// Jet as referenced by the flavour-matching product.
    pub jet: Jet,
    /// Signed PDG id of the matched parton (0 if none).
    pub pdg_id: i32,
}

/// Outcome of resolving a jet's truth label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruthLabel {
    /// Matched to an entry with a known flavour.
    Flavour(Flavour),
    /// Matched to an entry whose parton is not a b/c/light quark or gluon.
    Unlabelled,
    /// No entry within tolerance.
    Unmatched,
}

/// Per-event jet → flavour table, built once by the producer and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TruthAssociation {
    entries: Vec<TruthEntry>,
}

impl TruthAssociation {
    /// Build from entries in producer order.
    pub fn new(entries: Vec<TruthEntry>) -> Self {
        Self { entries }
    }

    /// Entries in producer order.
    pub fn entries(&self) -> &[TruthEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the truth label of `jet` through `matcher`.
    pub fn resolve(&self, jet: &Jet, matcher: &SpatialMatcher) -> TruthLabel {
        let candidates = self.entries.iter().map(|e| (Some(&e.jet), e.pdg_id));
        match matcher.best_match(jet, candidates) {
            Some(m) => match Flavour::from_pdg_id(m.payload) {
                Some(f) => TruthLabel::Flavour(f),
                None => TruthLabel::Unlabelled,
            },
            None => TruthLabel::Unmatched,
        }
    }
}

impl FromIterator<TruthEntry> for TruthAssociation {
    fn from_iter<T: IntoIterator<Item = TruthEntry>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pdg_id() {
        assert_eq!(Flavour::from_pdg_id(5), Some(Flavour::B));
        assert_eq!(Flavour::from_pdg_id(-5), Some(Flavour::B));
        assert_eq!(Flavour::from_pdg_id(-4), Some(Flavour::C));
        for id in [1, -2, 3, 21] {
            assert_eq!(Flavour::from_pdg_id(id), Some(Flavour::Light));
        }
        assert_eq!(Flavour::from_pdg_id(0), None);
        assert_eq!(Flavour::from_pdg_id(6), None);
        assert_eq!(Flavour::from_pdg_id(i32::MIN), None);
    }

    #[test]
    fn test_resolve() {
        let truth: TruthAssociation = [
            TruthEntry { jet: Jet::new(0.5, 1.0, 40.0), pdg_id: -5 },
            TruthEntry { jet: Jet::new(-1.2, 2.0, 30.0), pdg_id: 0 },
        ]
        .into_iter()
        .collect();
        let m = SpatialMatcher::default();
        assert_eq!(truth.resolve(&Jet::new(0.5, 1.0, 40.0), &m), TruthLabel::Flavour(Flavour::B));
        assert_eq!(truth.resolve(&Jet::new(-1.2, 2.0, 30.0), &m), TruthLabel::Unlabelled);
        assert_eq!(truth.resolve(&Jet::new(2.0, -2.0, 30.0), &m), TruthLabel::Unmatched);
    }

    #[test]
    fn test_flavour_serde_labels() {
        assert_eq!(serde_json::to_string(&Flavour::Light).unwrap(), "\"udsg\"");
        assert_eq!(serde_json::to_string(&Flavour::B).unwrap(), "\"b\"");
        let f: Flavour = serde_json::from_str("\"c\"").unwrap();
        assert_eq!(f, Flavour::C);
    }
}
