//! Ranking, comparison, and summary of evaluation runs.
//!
//! Judgments arrive as one flat sequence per source. [`normalize`] turns that
//! sequence into rows with a per-query rank, [`compare`] outer-joins several
//! sources on (query, rank), and [`summarize`] counts labels.

use crate::error::{EvalError, Result};
use crate::judge::{Judgment, Label};
use crate::orchestrator::EvaluationRun;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A judgment with its 1-based position in its query's result list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub query: String,
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<Value>,
    pub object: Value,
    pub score: f64,
    pub label: Label,
    pub explanation: String,
}

/// Split judgments into maximal runs of consecutive equal queries.
///
/// A query that reappears after a different one starts a new run.
pub fn group_by_query_runs(judgments: &[Judgment]) -> Vec<&[Judgment]> {
    judgments
        .chunk_by(|a, b| a.query == b.query)
        .collect()
}

/// Assign ranks to a run's judgments.
///
/// Rank restarts at 1 whenever the query differs from the previous
/// judgment's query, so `[q1, q1, q2, q1]` ranks as `[1, 2, 1, 1]`.
pub fn normalize(run: &EvaluationRun) -> Vec<RankedRow> {
    group_by_query_runs(&run.judgments)
        .into_iter()
        .flat_map(|group| {
            group.iter().enumerate().map(|(i, j)| RankedRow {
                query: j.query.clone(),
                rank: i + 1,
                object_id: j.object_id.clone(),
                object: j.object.clone(),
                score: j.score(),
                label: j.label(),
                explanation: j.explanation().to_string(),
            })
        })
        .collect()
}

/// Normalize several runs, keyed by source id.
///
/// Fails with [`EvalError::DuplicateSource`] when two runs share an id, so no
/// run is silently replaced by another.
pub fn rank_runs(
    runs: impl IntoIterator<Item = EvaluationRun>,
) -> Result<BTreeMap<String, Vec<RankedRow>>> {
    let mut ranked = BTreeMap::new();
    for run in runs {
        let rows = normalize(&run);
        if ranked.insert(run.source_id.clone(), rows).is_some() {
            return Err(EvalError::DuplicateSource(run.source_id));
        }
    }
    Ok(ranked)
}

/// One source's view of a (query, rank) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCell {
    pub label: Label,
    pub object: Value,
    pub explanation: String,
}

/// One (query, rank) slot across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub query: String,
    pub rank: usize,
    /// `None` when the source has no result in this slot.
    pub cells: BTreeMap<String, Option<ComparisonCell>>,
}

impl ComparisonRow {
    pub fn cell(&self, source_id: &str) -> Option<&ComparisonCell> {
        self.cells.get(source_id).and_then(Option::as_ref)
    }
}

/// Outer join of several sources' ranked rows on (query, rank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub sources: Vec<String>,
    /// Sorted by query, then rank.
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn row(&self, query: &str, rank: usize) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.query == query && r.rank == rank)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outer-join ranked rows of at least two sources on (query, rank).
///
/// Every (query, rank) present in any source yields exactly one row.
pub fn compare(runs: &BTreeMap<String, Vec<RankedRow>>) -> Result<ComparisonTable> {
    if runs.len() < 2 {
        return Err(EvalError::InsufficientSources { found: runs.len() });
    }

    let mut by_source: BTreeMap<&str, BTreeMap<(&str, usize), &RankedRow>> = BTreeMap::new();
    let mut keys: BTreeSet<(&str, usize)> = BTreeSet::new();

    for (source_id, rows) in runs {
        let slots = by_source.entry(source_id.as_str()).or_default();
        for row in rows {
            let key = (row.query.as_str(), row.rank);
            keys.insert(key);
            // A repeated slot within one source keeps its first row.
            slots.entry(key).or_insert(row);
        }
    }

    let rows = keys
        .into_iter()
        .map(|key| ComparisonRow {
            query: key.0.to_string(),
            rank: key.1,
            cells: by_source
                .iter()
                .map(|(source_id, slots)| {
                    let cell = slots.get(&key).map(|row| ComparisonCell {
                        label: row.label,
                        object: row.object.clone(),
                        explanation: row.explanation.clone(),
                    });
                    (source_id.to_string(), cell)
                })
                .collect(),
        })
        .collect();

    Ok(ComparisonTable {
        sources: runs.keys().cloned().collect(),
        rows,
    })
}

/// Label counts for one set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub total: usize,
    pub great: usize,
    pub ok: usize,
    pub bad: usize,
}

impl LabelSummary {
    pub fn count(&self, label: Label) -> usize {
        match label {
            Label::Great => self.great,
            Label::Ok => self.ok,
            Label::Bad => self.bad,
        }
    }

    /// Share of rows with `label`, in percent; 0.0 for an empty summary.
    pub fn percentage(&self, label: Label) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(label) as f64 / self.total as f64 * 100.0
        }
    }

    /// Percentage formatted with two decimals, e.g. `"75.00%"`.
    pub fn format_percentage(&self, label: Label) -> String {
        format!("{:.2}%", self.percentage(label))
    }
}

/// Count rows per label.
pub fn summarize(rows: &[RankedRow]) -> LabelSummary {
    rows.iter().fold(
        LabelSummary {
            total: rows.len(),
            ..Default::default()
        },
        |mut summary, row| {
            match row.label {
                Label::Great => summary.great += 1,
                Label::Ok => summary.ok += 1,
                Label::Bad => summary.bad += 1,
            }
            summary
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Verdict;
    use serde_json::json;

    fn judgment(query: &str, label: Label) -> Judgment {
        Judgment {
            query: query.to_string(),
            object_id: None,
            object: json!({"q": query}),
            verdict: Verdict {
                score: 0.5,
                label,
                explanation: format!("{} for {}", label, query),
            },
        }
    }

    fn run(source_id: &str, judgments: Vec<Judgment>) -> EvaluationRun {
        EvaluationRun {
            source_id: source_id.to_string(),
            judgments,
        }
    }

    fn rows(pairs: &[(&str, usize)], label: Label) -> Vec<RankedRow> {
        pairs
            .iter()
            .map(|(q, rank)| RankedRow {
                query: q.to_string(),
                rank: *rank,
                object_id: None,
                object: json!({"slot": format!("{}-{}", q, rank)}),
                score: 1.0,
                label,
                explanation: String::new(),
            })
            .collect()
    }

    #[test]
    fn test_rank_resets_on_query_change_not_identity() {
        let run = run(
            "a",
            vec![
                judgment("q1", Label::Great),
                judgment("q1", Label::Ok),
                judgment("q2", Label::Bad),
                judgment("q1", Label::Great),
            ],
        );

        let ranks: Vec<_> = normalize(&run).iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 1, 1]);
    }

    #[test]
    fn test_group_by_query_runs() {
        let judgments = vec![
            judgment("q1", Label::Great),
            judgment("q1", Label::Ok),
            judgment("q2", Label::Bad),
            judgment("q1", Label::Great),
        ];
        let groups = group_by_query_runs(&judgments);
        let sizes: Vec<_> = groups.iter().map(|g| (g[0].query.as_str(), g.len())).collect();
        assert_eq!(sizes, vec![("q1", 2), ("q2", 1), ("q1", 1)]);
        assert!(group_by_query_runs(&[]).is_empty());
    }

    #[test]
    fn test_normalize_carries_judgment_fields() {
        let run = run("a", vec![judgment("shoes", Label::Ok)]);
        let rows = normalize(&run);
        assert_eq!(rows[0].query, "shoes");
        assert_eq!(rows[0].label, Label::Ok);
        assert_eq!(rows[0].score, 0.5);
        assert_eq!(rows[0].object, json!({"q": "shoes"}));
        assert_eq!(rows[0].explanation, "OK for shoes");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let run = run(
            "a",
            vec![
                judgment("q1", Label::Great),
                judgment("q2", Label::Bad),
                judgment("q2", Label::Ok),
            ],
        );
        assert_eq!(normalize(&run), normalize(&run));
    }

    #[test]
    fn test_rank_runs_keys_by_source() {
        let ranked = rank_runs(vec![
            run("b", vec![judgment("q1", Label::Ok)]),
            run("a", vec![judgment("q1", Label::Great), judgment("q1", Label::Bad)]),
        ])
        .unwrap();
        assert_eq!(ranked.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(ranked["a"].len(), 2);
    }

    #[test]
    fn test_rank_runs_rejects_repeated_source() {
        let err = rank_runs(vec![
            run("x", vec![judgment("q1", Label::Ok)]),
            run("x", vec![judgment("q1", Label::Bad)]),
        ])
        .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateSource(ref id) if id == "x"));
    }

    #[test]
    fn test_compare_outer_join() {
        let mut runs = BTreeMap::new();
        runs.insert("a".to_string(), rows(&[("q", 1), ("q", 2)], Label::Great));
        runs.insert("b".to_string(), rows(&[("q", 1), ("q", 3)], Label::Bad));

        let table = compare(&runs).unwrap();

        let keys: Vec<_> = table.rows.iter().map(|r| (r.query.as_str(), r.rank)).collect();
        assert_eq!(keys, vec![("q", 1), ("q", 2), ("q", 3)]);
        assert_eq!(table.sources, vec!["a", "b"]);

        let r1 = table.row("q", 1).unwrap();
        assert_eq!(r1.cell("a").unwrap().label, Label::Great);
        assert_eq!(r1.cell("b").unwrap().label, Label::Bad);

        let r2 = table.row("q", 2).unwrap();
        assert!(r2.cell("a").is_some());
        assert_eq!(r2.cells.get("b"), Some(&None));

        let r3 = table.row("q", 3).unwrap();
        assert_eq!(r3.cells.get("a"), Some(&None));
        assert_eq!(r3.cell("b").unwrap().object, json!({"slot": "q-3"}));
    }

    #[test]
    fn test_compare_serializes_missing_cells_as_null() {
        let mut runs = BTreeMap::new();
        runs.insert("a".to_string(), rows(&[("q", 1)], Label::Ok));
        runs.insert("b".to_string(), rows(&[("r", 1)], Label::Ok));

        let value = serde_json::to_value(compare(&runs).unwrap()).unwrap();
        assert_eq!(value["rows"][0]["cells"]["b"], Value::Null);
        assert_eq!(value["rows"][1]["cells"]["a"], Value::Null);
    }

    #[test]
    fn test_compare_requires_two_sources() {
        let mut runs = BTreeMap::new();
        assert!(matches!(
            compare(&runs),
            Err(EvalError::InsufficientSources { found: 0 })
        ));

        runs.insert("a".to_string(), rows(&[("q", 1)], Label::Ok));
        assert!(matches!(
            compare(&runs),
            Err(EvalError::InsufficientSources { found: 1 })
        ));
    }

    #[test]
    fn test_compare_one_row_per_slot() {
        let mut runs = BTreeMap::new();
        runs.insert("a".to_string(), rows(&[("q", 1), ("q", 1)], Label::Ok));
        runs.insert("b".to_string(), rows(&[("q", 1)], Label::Bad));
        runs.insert("c".to_string(), Vec::new());

        let table = compare(&runs).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].cells.len(), 3);
        assert_eq!(table.rows[0].cells.get("c"), Some(&None));
    }

    #[test]
    fn test_summarize_percentages() {
        let run = run(
            "a",
            vec![
                judgment("q", Label::Great),
                judgment("q", Label::Great),
                judgment("q", Label::Great),
                judgment("q", Label::Ok),
            ],
        );
        let summary = summarize(&normalize(&run));

        assert_eq!(summary.total, 4);
        assert_eq!(summary.format_percentage(Label::Great), "75.00%");
        assert_eq!(summary.format_percentage(Label::Ok), "25.00%");
        assert_eq!(summary.format_percentage(Label::Bad), "0.00%");
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        for label in Label::ALL {
            assert_eq!(summary.count(label), 0);
            assert_eq!(summary.format_percentage(label), "0.00%");
        }
    }
}
