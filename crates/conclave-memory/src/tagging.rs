//! Derives the small fixed tag set that memory recall matches on.
//!
//! Every context maps to a trend bucket and a volatility bucket. Stored
//! decisions add their decision type; evaluations inherit the tags of the
//! decision they judge and add an outcome.

use std::collections::BTreeSet;

use conclave_models::{Decision, MarketContext, PerformanceEvaluation};

/// Volatility below this is `vol:low`.
pub const LOW_VOLATILITY_BOUND: f64 = 0.2;
/// Volatility below this (and not low) is `vol:medium`.
pub const HIGH_VOLATILITY_BOUND: f64 = 0.5;

pub fn trend_tag(context: &MarketContext) -> String {
    let bucket = context.trend().map(|t| t.as_str()).unwrap_or("unknown");
    format!("trend:{bucket}")
}

pub fn volatility_tag(volatility: f64) -> String {
    let bucket = if !volatility.is_finite() {
        "unknown"
    } else if volatility < LOW_VOLATILITY_BOUND {
        "low"
    } else if volatility < HIGH_VOLATILITY_BOUND {
        "medium"
    } else {
        "high"
    };
    format!("vol:{bucket}")
}

pub fn type_tag(label: &str) -> String {
    format!("type:{label}")
}

/// Query tags for a recall against `context`.
pub fn context_tags(context: &MarketContext) -> BTreeSet<String> {
    BTreeSet::from([trend_tag(context), volatility_tag(context.volatility)])
}

pub fn decision_tags(decision: &Decision) -> BTreeSet<String> {
    let mut tags = context_tags(&decision.context);
    tags.insert(type_tag(decision.decision_type.as_str()));
    tags
}

/// Tags for an evaluation. `judged` is the tag set of the evaluated
/// decision's memory item, when it is still in memory.
pub fn evaluation_tags(
    judged: Option<&BTreeSet<String>>,
    evaluation: &PerformanceEvaluation,
) -> BTreeSet<String> {
    let mut tags: BTreeSet<String> = judged
        .map(|t| t.iter().filter(|tag| !tag.starts_with("type:")).cloned().collect())
        .unwrap_or_default();
    tags.insert(type_tag("performance"));
    tags.insert(format!("outcome:{}", evaluation.outcome_label()));
    tags
}
