//! Threshold filtering and ordering of scored revisions.

use tracing::debug;

use crate::analysis::significance::SignificanceScorer;
use crate::errors::{RevscopeError, RevscopeResult};
use crate::models::{round_to, RankedRevision, TimedRevision};
use crate::query::guards::MIN_SIGNIFICANCE_REVISIONS;

/// Outcome of ranking one filtered revision set.
#[derive(Clone, Debug)]
pub struct SignificanceRanking<'a> {
    pub total_considered: usize,
    /// Revisions at or above the threshold, before the limit is applied.
    pub passing_count: usize,
    pub top: Vec<RankedRevision<'a>>,
}

/// Score every revision, keep those scoring at least `min_significance`, and
/// return the highest `limit` of them.
///
/// Ordering is by score as reported (three decimals), descending; ties keep
/// their newest-first input order.
pub fn rank_revisions<'a>(
    revisions: &[TimedRevision<'a>],
    min_significance: f64,
    limit: usize,
) -> RevscopeResult<SignificanceRanking<'a>> {
    if revisions.len() < MIN_SIGNIFICANCE_REVISIONS {
        return Err(RevscopeError::InsufficientData(
            "Insufficient revision data for significance analysis".to_string(),
        ));
    }

    let scorer = SignificanceScorer::new(revisions);
    let mut passing: Vec<RankedRevision<'a>> = Vec::new();
    for (index, timed) in revisions.iter().enumerate() {
        let score = scorer.score(index);
        if score < min_significance {
            continue;
        }
        if let Some(factors) = scorer.factors(index) {
            passing.push(RankedRevision {
                revision: timed.revision,
                significance_score: score,
                significance_factors: factors,
            });
        }
    }

    passing.sort_by(|a, b| {
        round_to(b.significance_score, 3).total_cmp(&round_to(a.significance_score, 3))
    });
    let passing_count = passing.len();
    passing.truncate(limit);

    debug!(
        "Ranked {} revisions: {passing_count} at or above {min_significance}",
        revisions.len()
    );

    Ok(SignificanceRanking {
        total_considered: revisions.len(),
        passing_count,
        top: passing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filter::{filter_by_date_range, DateRange};
    use crate::models::Revision;

    fn sample_history() -> Vec<Revision> {
        vec![
            Revision::new(5, "2024-01-10T12:00:00Z", Some("Regular"), 10_000)
                .with_size_delta(Some(20)),
            Revision::new(4, "2024-01-08T12:00:00Z", Some("Drive-by"), 9_980)
                .with_size_delta(Some(4_000))
                .with_comment("Disputed section, see talk page"),
            Revision::new(3, "2024-01-06T12:00:00Z", Some("Regular"), 5_980)
                .with_size_delta(Some(-10)),
            Revision::new(2, "2024-01-04T12:00:00Z", Some("Regular"), 5_990)
                .with_size_delta(Some(30)),
            Revision::new(1, "2024-01-02T12:00:00Z", Some("Regular"), 5_960)
                .with_size_delta(Some(10)),
            Revision::new(0, "2024-01-01T12:00:00Z", Some("Regular"), 5_950),
        ]
    }

    #[test]
    fn single_revision_is_insufficient() {
        let revisions = vec![Revision::new(1, "2024-01-01T00:00:00Z", Some("A"), 10)];
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let err = rank_revisions(&timed, 0.5, 50).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
        assert_eq!(
            err.to_string(),
            "Insufficient revision data for significance analysis"
        );
    }

    #[test]
    fn big_contested_edit_ranks_first() {
        let revisions = sample_history();
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let ranking = rank_revisions(&timed, 0.0, 50).unwrap();

        assert_eq!(ranking.total_considered, 6);
        assert_eq!(ranking.passing_count, 6);
        assert_eq!(ranking.top[0].revision.id, serde_json::json!(4));
        let scores: Vec<f64> = ranking
            .top
            .iter()
            .map(|r| round_to(r.significance_score, 3))
            .collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(scores, sorted);
    }

    #[test]
    fn threshold_counts_before_limit() {
        let revisions = sample_history();
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let all = rank_revisions(&timed, 0.0, 50).unwrap();
        let limited = rank_revisions(&timed, 0.0, 2).unwrap();
        assert_eq!(limited.passing_count, all.passing_count);
        assert_eq!(limited.top.len(), 2);

        let strict = rank_revisions(&timed, 0.5, 50).unwrap();
        assert!(strict
            .top
            .iter()
            .all(|r| r.significance_score >= 0.5));
        assert_eq!(strict.passing_count, strict.top.len());
        assert!(strict.passing_count < all.passing_count);
    }

    #[test]
    fn ties_keep_newest_first_order() {
        // Identical edits by distinct newcomers, far apart in time.
        let revisions: Vec<Revision> = (0..4)
            .rev()
            .map(|i| {
                let ts = format!("2024-0{}-01T00:00:00Z", i + 1);
                let author = format!("user{i}");
                Revision::new(i, ts, Some(author.as_str()), 1_000).with_size_delta(Some(0))
            })
            .collect();
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let ranking = rank_revisions(&timed, 0.0, 10).unwrap();
        let ids: Vec<i64> = ranking
            .top
            .iter()
            .filter_map(|r| r.revision.id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 2, 1, 0]);
    }

    #[test]
    fn ranking_is_idempotent() {
        let revisions = sample_history();
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let first = rank_revisions(&timed, 0.2, 3).unwrap();
        let second = rank_revisions(&timed, 0.2, 3).unwrap();
        let first_json = serde_json::to_value(&first.top).unwrap();
        let second_json = serde_json::to_value(&second.top).unwrap();
        assert_eq!(first_json, second_json);
    }
}
