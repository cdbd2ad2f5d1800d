//! Custom assertions for report verification

use codegraph_collective::ir::ValueId;
use codegraph_collective::{AnalysisReport, Warning};

/// Assert the report has exactly `expected` warnings
pub fn assert_warning_count(report: &AnalysisReport, expected: usize) {
    assert_eq!(
        report.warnings.len(),
        expected,
        "Expected {expected} warnings, got: {:#?}",
        report.warning_lines()
    );
}

/// Assert no warning was reported
pub fn assert_no_warnings(report: &AnalysisReport) {
    assert_warning_count(report, 0);
}

/// The warning reported for `call`
pub fn warning_for(report: &AnalysisReport, call: ValueId) -> &Warning {
    report
        .warnings
        .iter()
        .find(|w| w.call == call)
        .unwrap_or_else(|| panic!("no warning for {call}: {:#?}", report.warning_lines()))
}

/// Lines of the conditions attached to a warning, in report order
pub fn condition_lines(warning: &Warning) -> Vec<u32> {
    warning
        .conditions
        .iter()
        .filter_map(|c| c.location.as_ref().map(|l| l.line))
        .collect()
}

/// Assert the taint trace passes through a given source line
pub fn assert_trace_mentions_line(warning: &Warning, line: u32) {
    assert!(
        warning
            .trace
            .iter()
            .any(|step| step.location.as_ref().map_or(false, |l| l.line == line)),
        "trace does not mention line {line}: {:#?}",
        warning.trace.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    );
}
