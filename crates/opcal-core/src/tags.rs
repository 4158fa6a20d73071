//! Tagger outputs: per-jet discriminators and the collections that carry them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kinematics::Jet;
use crate::matching::SpatialMatcher;

/// One tagger output: the jet it refers to and its discriminator value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TagObservation {
    /// Referenced jet; `None` for a dangling reference.
    pub jet: Option<Jet>,
    /// Discriminator value.
    pub discriminator: f64,
}

impl TagObservation {
    /// Observation referencing `jet`.
    pub fn new(jet: Jet, discriminator: f64) -> Self {
        Self { jet: Some(jet), discriminator }
    }
}

/// A tag collection as produced by one module in one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCollection {
    /// Label of the module that produced the collection.
    ///
    /// Several configured inputs may resolve to the same producer; the label is the
    /// identity used for per-jet deduplication.
    pub module: String,
    /// Observations in producer order.
    #[serde(default)]
    pub tags: Vec<TagObservation>,
}

impl TagCollection {
    /// Create a collection produced by `module`.
    pub fn new(module: impl Into<String>, tags: Vec<TagObservation>) -> Self {
        Self { module: module.into(), tags }
    }

    /// Discriminator of the tag matching `jet`, if any lies within tolerance.
    pub fn discriminator_for(&self, jet: &Jet, matcher: &SpatialMatcher) -> Option<f64> {
        let candidates = self.tags.iter().map(|t| (t.jet.as_ref(), t.discriminator));
        matcher.best_match(jet, candidates).map(|m| m.payload)
    }
}

/// Input tag naming a product: `module[:instance[:process]]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceTag {
    module: String,
    instance: String,
    process: String,
}

impl SourceTag {
    /// Tag with only a module label.
    pub fn new(module: impl Into<String>) -> Self {
        Self { module: module.into(), instance: String::new(), process: String::new() }
    }

    /// Module label.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Product instance name (may be empty).
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Process name (may be empty).
    pub fn process(&self) -> &str {
        &self.process
    }
}

impl FromStr for SourceTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() > 3 {
            return Err(Error::Config(format!("input tag '{s}' has more than three fields")));
        }
        let module = parts[0].trim();
        if module.is_empty() {
            return Err(Error::Config(format!("input tag '{s}' has an empty module label")));
        }
        let field = |i: usize| parts.get(i).map(|p| p.trim().to_string()).unwrap_or_default();
        Ok(Self { module: module.to_string(), instance: field(1), process: field(2) })
    }
}

impl TryFrom<String> for SourceTag {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SourceTag> for String {
    fn from(tag: SourceTag) -> String {
        tag.to_string()
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.module)?;
        if !self.instance.is_empty() || !self.process.is_empty() {
            write!(f, ":{}", self.instance)?;
        }
        if !self.process.is_empty() {
            write!(f, ":{}", self.process)?;
        }
        Ok(())
    }
}
