use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

pub const TAG_WEIGHT: f64 = 0.7;
pub const RECENCY_WEIGHT: f64 = 0.3;
/// Age at which recency reaches zero.
pub const RECENCY_HORIZON_DAYS: f64 = 365.0;

/// Shared tags over the larger of the two tag sets.
pub fn tag_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let shared = a.intersection(b).count();
    shared as f64 / a.len().max(b.len()).max(1) as f64
}

/// 1.0 for brand-new items, falling linearly to 0.0 at one year.
pub fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - timestamp).num_seconds().max(0) as f64 / 86_400.0;
    (1.0 - age_days / RECENCY_HORIZON_DAYS).max(0.0)
}

pub fn relevance(
    item_tags: &BTreeSet<String>,
    query_tags: &BTreeSet<String>,
    timestamp: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    TAG_WEIGHT * tag_overlap(item_tags, query_tags) + RECENCY_WEIGHT * recency_score(timestamp, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn overlap_uses_larger_set() {
        let item = tags(&["trend:bullish", "vol:low", "type:hold"]);
        let query = tags(&["trend:bullish", "vol:low"]);
        assert!((tag_overlap(&item, &query) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(tag_overlap(&tags(&[]), &tags(&[])), 0.0);
    }

    #[test]
    fn recency_decays_over_a_year() {
        let now = Utc::now();
        assert_eq!(recency_score(now, now), 1.0);
        assert!((recency_score(now - Duration::days(73), now) - 0.8).abs() < 1e-9);
        assert_eq!(recency_score(now - Duration::days(400), now), 0.0);
        // Clock skew never pushes recency above 1.
        assert_eq!(recency_score(now + Duration::days(1), now), 1.0);
    }

    #[test]
    fn relevance_blends_tags_and_recency() {
        let now = Utc::now();
        let item = tags(&["trend:bullish", "vol:low"]);
        let score = relevance(&item, &item, now, now);
        assert!((score - 1.0).abs() < 1e-12);

        let stranger = tags(&["trend:bearish", "vol:high"]);
        let fresh_but_unrelated = relevance(&stranger, &item, now, now);
        assert!((fresh_but_unrelated - 0.3).abs() < 1e-12);
    }
}
