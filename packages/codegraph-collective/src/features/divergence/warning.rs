//! Findings of the divergence detector

use crate::features::taint::TraceStep;
use crate::ir::{BlockId, DebugLoc, ValueId};
use serde::Serialize;
use std::fmt;

/// A branch whose outcome decides whether a collective is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionSite {
    /// Branch condition value
    pub value: ValueId,
    pub function: String,
    pub block: BlockId,
    /// Location of the branch instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DebugLoc>,
}

/// A collective that some participants may skip
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub call: ValueId,
    pub collective: String,
    /// Function containing the call
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DebugLoc>,
    /// Tainted controlling conditions, in discovery order
    pub conditions: Vec<ConditionSite>,
    /// Taint trace of the first condition, source first
    pub trace: Vec<TraceStep>,
}

impl Warning {
    pub fn line(&self) -> u32 {
        self.location.as_ref().map_or(0, |l| l.line)
    }

    /// Human-readable message, one line
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {} possibly not called by all processes because of conditional(s) line(s) ",
            self.collective,
            self.line()
        )?;
        for cond in &self.conditions {
            match &cond.location {
                Some(loc) => write!(f, " {} ({})", loc.line, loc.file)?,
                None => write!(f, " 0 (?)")?,
            }
        }
        write!(f, " (Call Ordering Error)")
    }
}

/// A collective inside a loop: the iteration count must match across
/// participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopAdvisory {
    pub call: ValueId,
    pub collective: String,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<DebugLoc>,
}

impl fmt::Display for LoopAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.location.as_ref().map_or(0, |l| l.line);
        write!(
            f,
            "{} line {} is called in a loop in {}, every process must run the same number of iterations",
            self.collective, line, self.function
        )
    }
}
