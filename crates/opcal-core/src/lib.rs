//! # opcal-core
//!
//! Operating-point calibration for jet taggers.
//!
//! Jets are matched to their truth flavour and to each tagger's discriminator by
//! (η, φ) proximity, discriminators are accumulated per tagger and flavour, and at the
//! end of the run the light-flavour efficiency curve is inverted to find the cut (and
//! the b efficiency) for each requested mistag rate.
//!
//! ## Example
//!
//! ```
//! use opcal_core::{CurveBinning, Flavour, InversionPolicy, TaggerPerformance};
//! use opcal_core::calibration::{FlavourCurves, resolve_mistag_target};
//!
//! let mut perf = TaggerPerformance::new("TCHE", 0.0, 1.0, CurveBinning::Exact);
//! for d in [0.1, 0.5, 0.9] {
//!     perf.add(d, Flavour::B).unwrap();
//! }
//! for d in [0.2, 0.3, 0.4, 0.95] {
//!     perf.add(d, Flavour::Light).unwrap();
//! }
//! let curves = FlavourCurves::build(&mut perf);
//! let wp = resolve_mistag_target(&curves, "Medium", 0.25, InversionPolicy::Reject).unwrap();
//! assert_eq!(wp.discriminator_cut, 0.4);
//! assert!((wp.signal_efficiency - 2.0 / 3.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calibration;
pub mod config;
pub mod correction;
pub mod curve;
pub mod driver;
pub mod error;
pub mod event;
pub mod kinematics;
pub mod matching;
pub mod performance;
pub mod registry;
pub mod tags;
pub mod truth;
pub mod working_point;

pub use calibration::{
    InversionPolicy, RejectedWorkingPoint, TaggerReport, WorkingPointResult, calibrate,
    evaluate_fixed_cut, resolve_mistag_target,
};
pub use config::{CalibrationConfig, JetCuts, OperatingPointConfig, TaggerConfig};
pub use correction::{CorrectionProvider, NoCorrection, StoredCorrection};
pub use curve::{CurvePoint, DiscriminatorCurve, EfficiencyCurve, PerformanceCurve};
pub use driver::{CalibrationDriver, CalibrationReport, EventOutcome, RunStats};
pub use error::{Error, Result};
pub use event::{Event, EventRecord};
pub use kinematics::Jet;
pub use matching::{Match, SpatialMatcher};
pub use performance::TaggerPerformance;
pub use registry::{ObserveStats, TaggerRegistry};
pub use tags::{SourceTag, TagCollection, TagObservation};
pub use truth::{Flavour, TruthAssociation, TruthEntry, TruthLabel};
pub use working_point::{CalibrationMode, CurveBinning, WorkingPoint};
