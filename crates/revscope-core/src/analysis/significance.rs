//! Weighted significance scoring for individual revisions.

use std::collections::HashMap;
use std::sync::LazyLock;

use pyo3::prelude::*;
use regex::RegexSet;

use crate::models::{Revision, SignificanceFactors, SubScores, TimedRevision};

pub const SIZE_CHANGE_WEIGHT: f64 = 0.30;
pub const REVERT_PROXIMITY_WEIGHT: f64 = 0.25;
pub const AUTHOR_EXPERIENCE_WEIGHT: f64 = 0.20;
pub const DISCUSSION_WEIGHT: f64 = 0.15;
pub const EDIT_WAR_WEIGHT: f64 = 0.10;

/// More-recent neighbours inspected for a probable revert.
pub const REVERT_LOOKAHEAD: usize = 5;
pub const REVERT_WINDOW_SECONDS: f64 = 3600.0;
pub const REVERT_SIZE_TOLERANCE: u64 = 50;
pub const EDIT_WAR_WINDOW_SECONDS: f64 = 86400.0;
/// Co-occurring edits within a day that saturate the edit-war score.
pub const EDIT_WAR_SATURATION: f64 = 20.0;
const MIN_SIZE_NORMALIZER: f64 = 100.0;
const EXPERIENCED_AUTHOR_EDITS: f64 = 5.0;
const KEYWORD_STEP: f64 = 0.2;

const DISCUSSION_PATTERNS: &[&str] = &[
    "talk page",
    "discuss",
    "see talk",
    "talk:",
    "consensus",
    "dispute",
    "controversial",
    "revert",
    "vandalism",
    "rv",
];

/// Narrower keyword list behind the boolean flag in the factor breakdown.
const FACTOR_KEYWORDS: &[&str] = &["talk", "discuss", "revert", "dispute"];

static DISCUSSION_SET: LazyLock<RegexSet> = LazyLock::new(|| keyword_set(DISCUSSION_PATTERNS));
static FACTOR_SET: LazyLock<RegexSet> = LazyLock::new(|| keyword_set(FACTOR_KEYWORDS));

fn keyword_set(keywords: &[&str]) -> RegexSet {
    RegexSet::new(
        keywords
            .iter()
            .map(|k| format!("(?i){}", regex::escape(k))),
    )
    .unwrap()
}

/// Size of the edit relative to a tenth of the document, floored at 100 bytes.
#[pyfunction]
#[pyo3(signature = (size_delta, document_size))]
pub fn size_change_impact(size_delta: Option<i64>, document_size: i64) -> f64 {
    let change = size_delta.unwrap_or(0).unsigned_abs() as f64;
    let normalizer = (document_size as f64 * 0.1).max(MIN_SIZE_NORMALIZER);
    (change / normalizer).min(1.0)
}

/// Inverse experience: authors with fewer in-set edits score higher.
#[pyfunction]
pub fn author_experience_score(edit_count: i64) -> f64 {
    (EXPERIENCED_AUTHOR_EDITS / edit_count.max(1) as f64).min(1.0)
}

/// 0.2 per distinct discussion pattern found in the comment, capped at 1.
#[pyfunction]
pub fn discussion_keyword_score(comment: &str) -> f64 {
    let matched = DISCUSSION_SET.matches(comment).iter().count();
    (matched as f64 * KEYWORD_STEP).min(1.0)
}

pub fn has_discussion_keywords(comment: &str) -> bool {
    FACTOR_SET.is_match(comment)
}

/// Score how quickly the revision at `index` appears to have been undone.
///
/// `revisions` is newest first, so the candidates are the up to five entries
/// just before `index`. They are scanned from the farthest towards the
/// nearest and the first match wins. A match needs both a gap under an hour
/// and a size within 50 bytes of the target's.
pub fn revert_proximity(revisions: &[TimedRevision<'_>], index: usize) -> f64 {
    let Some(target) = revisions.get(index) else {
        return 0.0;
    };
    let start = index.saturating_sub(REVERT_LOOKAHEAD);
    for candidate in &revisions[start..index] {
        let gap = target.seconds_apart(candidate);
        let size_diff = candidate.revision.size.abs_diff(target.revision.size);
        if gap < REVERT_WINDOW_SECONDS && size_diff < REVERT_SIZE_TOLERANCE {
            return (1.0 - gap / REVERT_WINDOW_SECONDS).max(0.0);
        }
    }
    0.0
}

/// Share of the saturation count of revisions within 24 hours of the target,
/// the target included.
// TODO: swap the full rescan for a sliding window over the ordered
// timestamps; ranking a batch is quadratic as written.
pub fn edit_war_density(revisions: &[TimedRevision<'_>], index: usize) -> f64 {
    let Some(target) = revisions.get(index) else {
        return 0.0;
    };
    let nearby = revisions
        .iter()
        .filter(|other| target.seconds_apart(other) <= EDIT_WAR_WINDOW_SECONDS)
        .count();
    (nearby as f64 / EDIT_WAR_SATURATION).min(1.0)
}

/// Weighted sum of the sub-scores, each clamped to `[0, 1]` first.
pub fn composite_score(sub: &SubScores) -> f64 {
    let clamp = |v: f64| v.clamp(0.0, 1.0);
    let score = SIZE_CHANGE_WEIGHT * clamp(sub.size_change)
        + REVERT_PROXIMITY_WEIGHT * clamp(sub.revert_proximity)
        + AUTHOR_EXPERIENCE_WEIGHT * clamp(sub.author_experience)
        + DISCUSSION_WEIGHT * clamp(sub.discussion_keywords)
        + EDIT_WAR_WEIGHT * clamp(sub.edit_war_density);
    score.min(1.0)
}

/// Scores revisions against the filtered set they were drawn from.
///
/// The document size is taken from the newest revision and author edit
/// counts from the whole set.
pub struct SignificanceScorer<'r, 'a> {
    revisions: &'r [TimedRevision<'a>],
    document_size: i64,
    author_edit_counts: HashMap<&'a str, usize>,
}

impl<'r, 'a> SignificanceScorer<'r, 'a> {
    pub fn new(revisions: &'r [TimedRevision<'a>]) -> Self {
        let mut author_edit_counts: HashMap<&'a str, usize> = HashMap::new();
        for timed in revisions {
            if let Some(author) = timed.revision.author.as_deref().filter(|a| !a.is_empty()) {
                *author_edit_counts.entry(author).or_insert(0) += 1;
            }
        }
        Self {
            revisions,
            document_size: revisions.first().map(|t| t.revision.size).unwrap_or(0),
            author_edit_counts,
        }
    }

    pub fn document_size(&self) -> i64 {
        self.document_size
    }

    /// In-set edit count for the revision's author; anonymous edits count as 1.
    pub fn author_edit_count(&self, revision: &Revision) -> usize {
        revision
            .author
            .as_deref()
            .and_then(|author| self.author_edit_counts.get(author))
            .copied()
            .unwrap_or(1)
    }

    pub fn sub_scores(&self, index: usize) -> SubScores {
        let Some(timed) = self.revisions.get(index) else {
            return SubScores::default();
        };
        let revision = timed.revision;
        SubScores {
            size_change: size_change_impact(revision.size_delta, self.document_size),
            revert_proximity: revert_proximity(self.revisions, index),
            author_experience: author_experience_score(self.author_edit_count(revision) as i64),
            discussion_keywords: discussion_keyword_score(&revision.comment),
            edit_war_density: edit_war_density(self.revisions, index),
        }
    }

    pub fn score(&self, index: usize) -> f64 {
        composite_score(&self.sub_scores(index))
    }

    /// Reporting view of the inputs behind a revision's score.
    pub fn factors(&self, index: usize) -> Option<SignificanceFactors<'a>> {
        let revision: &'a Revision = self.revisions.get(index)?.revision;
        Some(SignificanceFactors {
            size_change_bytes: revision.size_delta,
            normalized_size_impact: size_change_impact(revision.size_delta, self.document_size),
            author_experience_level: self.author_edit_count(revision),
            has_discussion_keywords: has_discussion_keywords(&revision.comment),
            edit_comment: &revision.comment,
            timestamp: &revision.timestamp,
            author: revision.author.as_deref(),
        })
    }
}
