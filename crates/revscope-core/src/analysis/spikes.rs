//! Z-score spike detection over windowed edit activity.

use indexmap::IndexMap;

use crate::errors::{RevscopeError, RevscopeResult};
use crate::models::{SeriesStats, Severity, Spike, TimeWindow};
use crate::query::guards::{MAX_SPIKE_SAMPLES, MIN_ACTIVITY_WINDOWS};

/// Mean, unbiased sample standard deviation, min and max of a count series.
///
/// Standard deviation is 0 for fewer than two values.
pub fn series_stats(values: &[usize]) -> SeriesStats {
    if values.is_empty() {
        return SeriesStats {
            mean: 0.0,
            stdev: 0.0,
            min: 0,
            max: 0,
        };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<usize>() as f64 / n;
    let stdev = if values.len() < 2 {
        0.0
    } else {
        let sum_sq: f64 = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
        (sum_sq / (n - 1.0)).sqrt()
    };
    SeriesStats {
        mean,
        stdev,
        min: values.iter().copied().min().unwrap_or(0),
        max: values.iter().copied().max().unwrap_or(0),
    }
}

/// Standard score of `value`; zero when the series has no variance.
pub fn z_score(value: usize, stats: &SeriesStats) -> f64 {
    if stats.stdev > 0.0 {
        (value as f64 - stats.mean) / stats.stdev
    } else {
        0.0
    }
}

/// Statistics and flagged windows for one activity analysis.
#[derive(Clone, Debug)]
pub struct SpikeAnalysis<'a> {
    pub edit_stats: SeriesStats,
    pub author_stats: SeriesStats,
    pub spikes: Vec<Spike<'a>>,
}

/// Flag windows whose edit or author count sits at least `threshold`
/// standard deviations above the mean.
///
/// Only upper-tail deviations qualify. Spikes come back ordered by their
/// larger z-score, highest first.
pub fn detect_spikes<'a>(
    windows: &IndexMap<String, TimeWindow<'a>>,
    threshold: f64,
) -> RevscopeResult<SpikeAnalysis<'a>> {
    if windows.len() < MIN_ACTIVITY_WINDOWS {
        return Err(RevscopeError::InsufficientData(format!(
            "Insufficient data for statistical analysis (need at least {MIN_ACTIVITY_WINDOWS} time windows)"
        )));
    }

    let edit_counts: Vec<usize> = windows.values().map(TimeWindow::edit_count).collect();
    let author_counts: Vec<usize> = windows.values().map(TimeWindow::author_count).collect();
    let edit_stats = series_stats(&edit_counts);
    let author_stats = series_stats(&author_counts);

    let mut spikes: Vec<Spike<'a>> = windows
        .values()
        .filter_map(|window| {
            let edit_z = z_score(window.edit_count(), &edit_stats);
            let author_z = z_score(window.author_count(), &author_stats);
            if edit_z < threshold && author_z < threshold {
                return None;
            }
            Some(Spike {
                window: window.label.clone(),
                edit_count: window.edit_count(),
                author_count: window.author_count(),
                edit_z_score: edit_z,
                author_z_score: author_z,
                severity: Severity::from_peak_z(edit_z.max(author_z)),
                authors: window.authors.iter().copied().collect(),
                sample_revisions: window
                    .revisions
                    .iter()
                    .take(MAX_SPIKE_SAMPLES)
                    .map(|timed| timed.revision)
                    .collect(),
            })
        })
        .collect();

    spikes.sort_by(|a, b| b.peak_z().total_cmp(&a.peak_z()));

    Ok(SpikeAnalysis {
        edit_stats,
        author_stats,
        spikes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filter::{filter_by_date_range, DateRange};
    use crate::analysis::windows::aggregate_windows;
    use crate::models::{Revision, WindowSize};

    /// `days[i]` revisions on 2024-01-(i+1), newest first, rotating through
    /// `authors_per_day` authors.
    fn daily_history(days: &[usize], authors_per_day: usize) -> Vec<Revision> {
        let mut revisions = Vec::new();
        let mut id = 0;
        for (day, &count) in days.iter().enumerate().rev() {
            for edit in 0..count {
                let author = format!("editor{}", edit % authors_per_day.max(1));
                let ts = format!("2024-01-{:02}T{:02}:00:00Z", day + 1, 23 - edit % 24);
                revisions.push(Revision::new(id, ts, Some(author.as_str()), 1000));
                id += 1;
            }
        }
        revisions
    }

    #[test]
    fn stats_use_sample_stdev() {
        let stats = series_stats(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert_eq!(stats.mean, 5.0);
        assert!((stats.stdev - 2.138_089_935).abs() < 1e-6);
        assert_eq!(stats.min, 2);
        assert_eq!(stats.max, 9);
    }

    #[test]
    fn stats_of_single_value_have_zero_stdev() {
        let stats = series_stats(&[4]);
        assert_eq!(stats.stdev, 0.0);
        assert_eq!(stats.mean, 4.0);
    }

    #[test]
    fn z_score_is_zero_without_variance() {
        let stats = series_stats(&[3, 3, 3, 3]);
        assert_eq!(z_score(3, &stats), 0.0);
        assert_eq!(z_score(30, &stats), 0.0);
    }

    #[test]
    fn single_outlier_day_is_the_only_spike() {
        let revisions = daily_history(&[1, 2, 1, 10, 1, 2, 1], 1);
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let windows = aggregate_windows(&timed, WindowSize::Day);
        assert_eq!(windows.len(), 7);

        let analysis = detect_spikes(&windows, 1.5).unwrap();
        assert_eq!(analysis.spikes.len(), 1);
        let spike = &analysis.spikes[0];
        assert_eq!(spike.window, "2024-01-04");
        assert_eq!(spike.edit_count, 10);
        assert!(spike.edit_z_score > 2.2 && spike.edit_z_score < 2.3);
        assert_eq!(spike.author_z_score, 0.0);
        assert_eq!(spike.severity, Severity::Moderate);
        assert_eq!(spike.sample_revisions.len(), MAX_SPIKE_SAMPLES);
        assert_eq!(spike.authors, vec!["editor0"]);
    }

    #[test]
    fn below_mean_windows_are_never_spikes() {
        let revisions = daily_history(&[10, 10, 1, 10, 10], 1);
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let windows = aggregate_windows(&timed, WindowSize::Day);
        for threshold in [0.01, 0.5, 1.0, 2.0, 3.0] {
            let analysis = detect_spikes(&windows, threshold).unwrap();
            assert!(analysis.spikes.iter().all(|s| s.window != "2024-01-03"));
        }
    }

    #[test]
    fn author_spike_alone_qualifies_and_high_severity() {
        // Flat edit counts, one day with many distinct authors.
        let mut revisions = daily_history(&[5; 20], 1);
        for rev in revisions.iter_mut().filter(|r| r.timestamp.starts_with("2024-01-05")) {
            rev.author = Some(format!("author{}", rev.id));
        }
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let windows = aggregate_windows(&timed, WindowSize::Day);
        let analysis = detect_spikes(&windows, 2.0).unwrap();

        assert_eq!(analysis.edit_stats.stdev, 0.0);
        assert_eq!(analysis.spikes.len(), 1);
        let spike = &analysis.spikes[0];
        assert_eq!(spike.window, "2024-01-05");
        assert_eq!(spike.edit_z_score, 0.0);
        assert!(spike.author_z_score >= 3.0);
        assert_eq!(spike.severity, Severity::High);
    }

    #[test]
    fn spikes_sorted_by_peak_z_descending() {
        let revisions = daily_history(&[1, 1, 1, 1, 1, 1, 1, 1, 6, 12], 1);
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let windows = aggregate_windows(&timed, WindowSize::Day);
        let analysis = detect_spikes(&windows, 0.5).unwrap();
        let labels: Vec<&str> = analysis.spikes.iter().map(|s| s.window.as_str()).collect();
        assert_eq!(labels, vec!["2024-01-10", "2024-01-09"]);
    }

    #[test]
    fn fewer_than_three_windows_is_insufficient() {
        let revisions = daily_history(&[4, 9], 2);
        let timed = filter_by_date_range(&revisions, &DateRange::unbounded());
        let windows = aggregate_windows(&timed, WindowSize::Day);
        let err = detect_spikes(&windows, 2.0).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
        assert!(err.to_string().contains("Insufficient data"));
    }
}
