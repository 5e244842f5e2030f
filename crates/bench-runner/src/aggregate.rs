//! Results aggregation and best-model / best-resolution verdicts

use bench_core::{ModelId, ResolutionClass, ResultRow};
use serde::Serialize;
use std::collections::HashMap;

/// Timing statistics for one (model, resolution) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub model: ModelId,
    pub resolution: ResolutionClass,
    /// Rows recorded for the pair, failed ones included
    pub images: usize,
    pub failed: usize,
    /// Mean per-image seconds over completed rows; `None` when every row failed
    pub mean_secs: Option<f64>,
    pub sum_secs: f64,
}

impl GroupStats {
    fn new(model: ModelId, resolution: ResolutionClass) -> Self {
        Self {
            model,
            resolution,
            images: 0,
            failed: 0,
            mean_secs: None,
            sum_secs: 0.0,
        }
    }

    pub fn completed(&self) -> usize {
        self.images - self.failed
    }
}

/// Average of group means for one key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Average<K> {
    pub key: K,
    /// `None` when no group for this key has a mean
    pub average_secs: Option<f64>,
}

/// Aggregated view of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Per-pair statistics, in order of first appearance
    pub groups: Vec<GroupStats>,
    pub models: Vec<Average<ModelId>>,
    pub resolutions: Vec<Average<ResolutionClass>>,
    pub best_model: Option<Average<ModelId>>,
    pub best_resolution: Option<Average<ResolutionClass>>,
    pub total_rows: usize,
    pub failed_rows: usize,
}

/// Outcome of [`summarize`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Summary {
    /// No rows were recorded
    NoResults,
    Report(Report),
}

impl Summary {
    pub fn report(&self) -> Option<&Report> {
        match self {
            Summary::NoResults => None,
            Summary::Report(report) => Some(report),
        }
    }
}

/// Group rows by (model, resolution) and pick the fastest model and resolution.
///
/// Keys keep the order in which they first appear in `rows`, which for driver
/// output is model order then resolution order; ties go to the earlier key.
pub fn summarize(rows: &[ResultRow]) -> Summary {
    if rows.is_empty() {
        return Summary::NoResults;
    }

    let mut groups: Vec<GroupStats> = Vec::new();
    let mut index: HashMap<(&ModelId, &ResolutionClass), usize> = HashMap::new();
    let mut models: Vec<ModelId> = Vec::new();
    let mut resolutions: Vec<ResolutionClass> = Vec::new();

    for row in rows {
        let slot = *index.entry((&row.model, &row.resolution)).or_insert_with(|| {
            groups.push(GroupStats::new(row.model.clone(), row.resolution.clone()));
            groups.len() - 1
        });
        if !models.contains(&row.model) {
            models.push(row.model.clone());
        }
        if !resolutions.contains(&row.resolution) {
            resolutions.push(row.resolution.clone());
        }

        let group = &mut groups[slot];
        group.images += 1;
        match row.elapsed_secs() {
            Some(secs) => group.sum_secs += secs,
            None => group.failed += 1,
        }
    }

    for group in &mut groups {
        let completed = group.completed();
        if completed > 0 {
            group.mean_secs = Some(group.sum_secs / completed as f64);
        }
    }

    let model_averages: Vec<Average<ModelId>> = models
        .into_iter()
        .map(|model| Average {
            average_secs: mean(groups.iter().filter(|g| g.model == model).filter_map(|g| g.mean_secs)),
            key: model,
        })
        .collect();

    let resolution_averages: Vec<Average<ResolutionClass>> = resolutions
        .into_iter()
        .map(|resolution| Average {
            average_secs: mean(
                groups
                    .iter()
                    .filter(|g| g.resolution == resolution)
                    .filter_map(|g| g.mean_secs),
            ),
            key: resolution,
        })
        .collect();

    Summary::Report(Report {
        best_model: fastest(&model_averages),
        best_resolution: fastest(&resolution_averages),
        models: model_averages,
        resolutions: resolution_averages,
        total_rows: rows.len(),
        failed_rows: groups.iter().map(|g| g.failed).sum(),
        groups,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Lowest average; the first key wins ties
fn fastest<K: Clone>(averages: &[Average<K>]) -> Option<Average<K>> {
    let mut best: Option<&Average<K>> = None;
    for candidate in averages {
        let Some(value) = candidate.average_secs else {
            continue;
        };
        match best.and_then(|b| b.average_secs) {
            Some(current) if value >= current => {}
            _ => best = Some(candidate),
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::{ResourceSnapshot, RowOutcome};

    fn row(model: &str, resolution: &str, secs: Option<f64>) -> ResultRow {
        ResultRow {
            model: model.into(),
            resolution: resolution.into(),
            image: "img.jpg".to_string(),
            outcome: match secs {
                Some(elapsed_secs) => RowOutcome::Completed { elapsed_secs },
                None => RowOutcome::Failed {
                    error: "Network error: refused".to_string(),
                },
            },
            snapshot: ResourceSnapshot::unavailable(),
        }
    }

    #[test]
    fn test_empty_rows_report_no_results() {
        assert_eq!(summarize(&[]), Summary::NoResults);
        assert!(summarize(&[]).report().is_none());
    }

    #[test]
    fn test_group_math() {
        let rows = vec![
            row("a", "720p", Some(1.0)),
            row("a", "720p", Some(3.0)),
            row("a", "4k", Some(4.0)),
            row("b", "720p", Some(1.0)),
            row("b", "4k", Some(2.0)),
        ];
        let summary = summarize(&rows);
        let report = summary.report().unwrap();

        assert_eq!(report.groups.len(), 4);
        let first = &report.groups[0];
        assert_eq!(first.images, 2);
        assert_eq!(first.sum_secs, 4.0);
        assert_eq!(first.mean_secs, Some(2.0));

        // a: mean(2, 4) = 3; b: mean(1, 2) = 1.5
        assert_eq!(report.models[0].average_secs, Some(3.0));
        assert_eq!(report.best_model.as_ref().unwrap().key.as_str(), "b");
        assert_eq!(report.best_model.as_ref().unwrap().average_secs, Some(1.5));

        // 720p: mean(2, 1) = 1.5; 4k: mean(4, 2) = 3
        assert_eq!(report.best_resolution.as_ref().unwrap().key.as_str(), "720p");
        assert_eq!(report.total_rows, 5);
    }

    #[test]
    fn test_ties_go_to_first_key() {
        let rows = vec![
            row("b", "4k", Some(2.0)),
            row("a", "4k", Some(2.0)),
            row("a", "720p", Some(2.0)),
        ];
        let report = summarize(&rows).report().cloned().unwrap();
        assert_eq!(report.best_model.unwrap().key.as_str(), "b");
        assert_eq!(report.best_resolution.unwrap().key.as_str(), "4k");
    }

    #[test]
    fn test_failed_rows_are_counted_but_not_timed() {
        let rows = vec![
            row("a", "720p", Some(2.0)),
            row("a", "720p", None),
            row("b", "720p", None),
        ];
        let report = summarize(&rows).report().cloned().unwrap();

        assert_eq!(report.groups[0].images, 2);
        assert_eq!(report.groups[0].failed, 1);
        assert_eq!(report.groups[0].mean_secs, Some(2.0));
        assert_eq!(report.groups[1].mean_secs, None);
        assert_eq!(report.models[1].average_secs, None);
        assert_eq!(report.best_model.unwrap().key.as_str(), "a");
        assert_eq!(report.failed_rows, 2);
    }

    #[test]
    fn test_all_failed_has_no_verdict() {
        let report = summarize(&[row("a", "720p", None)]).report().cloned().unwrap();
        assert!(report.best_model.is_none());
        assert!(report.best_resolution.is_none());
    }

    #[test]
    fn test_summary_serializes_with_status_tag() {
        let value = serde_json::to_value(summarize(&[])).unwrap();
        assert_eq!(value["status"], "no_results");

        let value = serde_json::to_value(summarize(&[row("a", "720p", Some(1.0))])).unwrap();
        assert_eq!(value["status"], "report");
        assert_eq!(value["best_model"]["key"], "a");
    }
}
