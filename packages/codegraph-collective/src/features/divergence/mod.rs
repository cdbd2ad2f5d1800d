//! # Divergence
//!
//! Maps every collective call site to the branches controlling whether it
//! runs (interprocedural PDF+) and reports the call when one of those
//! branches depends on participant identity.
//!
//! - `pdf`: interprocedural iterated post-dominance frontier
//! - `sequence`: per-block collective sequences, the optional NAVS filter
//! - `detector`: warnings, loop advisories and counters
//! - `warning`: report types and their text form

mod detector;
mod pdf;
mod sequence;
mod warning;

pub use detector::{DivergenceDetector, DivergenceReport, DivergenceStats};
pub use pdf::call_pdf_plus;
pub use sequence::{CollectiveSequences, Communicator};
pub use warning::{ConditionSite, LoopAdvisory, Warning};
