//! Per-event inputs consumed by the calibration driver.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::kinematics::Jet;
use crate::tags::TagCollection;
use crate::truth::TruthAssociation;

/// Access to the materialised products of one event.
///
/// Every accessor returns `None` when the product is absent from the event.
pub trait EventRecord {
    /// Jet candidates in producer order.
    fn jets(&self) -> Option<&[Jet]>;

    /// Jet → parton flavour association.
    fn truth(&self) -> Option<&TruthAssociation>;

    /// Tag collection registered under `source` (an input tag string).
    fn tag_collection(&self, source: &str) -> Option<&TagCollection>;

    /// Identifier used in diagnostics.
    fn id(&self) -> Option<u64> {
        None
    }
}

/// In-memory event, deserialisable from one JSON Lines record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Optional event identifier, reported when the event is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Jet collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jets: Option<Vec<Jet>>,
    /// Flavour association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<TruthAssociation>,
    /// Tag collections keyed by input tag.
    #[serde(default)]
    pub tags: HashMap<String, TagCollection>,
}

impl EventRecord for Event {
    fn jets(&self) -> Option<&[Jet]> {
        self.jets.as_deref()
    }

    fn truth(&self) -> Option<&TruthAssociation> {
        self.truth.as_ref()
    }

    fn tag_collection(&self, source: &str) -> Option<&TagCollection> {
        self.tags.get(source)
    }

    fn id(&self) -> Option<u64> {
        self.id
    }
}
