//! Metrics for resolution outcomes.
//!
//! Counters go through the `metrics` facade. The embedding process decides
//! whether a recorder is installed; without one every call is a no-op.

use std::sync::Once;

use metrics::{counter, describe_counter};

use crate::error::ResolveError;
use crate::resolver::TransactionMode;

/// Successful resolutions, labelled by transaction mode.
pub const RESOLUTIONS_TOTAL: &str = "cachetx_resolutions_total";

/// Failed configure or resolve steps, labelled by error kind.
pub const RESOLUTION_FAILURES_TOTAL: &str = "cachetx_resolution_failures_total";

static DESCRIBED: Once = Once::new();

/// Registers metric descriptions with the installed recorder.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        describe_counter!(
            RESOLUTIONS_TOTAL,
            "Cache transaction configurations resolved successfully"
        );
        describe_counter!(
            RESOLUTION_FAILURES_TOTAL,
            "Cache transaction configurations rejected or unresolvable"
        );
    });
}

/// Counts a successful resolution.
pub fn record_resolution(mode: TransactionMode) {
    counter!(RESOLUTIONS_TOTAL, "mode" => mode.as_str()).increment(1);
}

/// Counts a failed configure or resolve step.
pub fn record_failure(err: &ResolveError) {
    counter!(RESOLUTION_FAILURES_TOTAL, "kind" => err.kind()).increment(1);
}
