//! Persistence layer for scrape results and evaluation run artifacts.
//!
//! A run artifact is the completed job status exactly as the judgment service
//! returned it. It is the only input needed to rebuild an [`EvaluationRun`].

use crate::collector::ResultSet;
use crate::error::{EvalError, Result};
use crate::judge::JobStatus;
use crate::orchestrator::EvaluationRun;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name suffix of run artifacts.
pub const RUN_ARTIFACT_SUFFIX: &str = "_eval.json";

/// Path of the collected results for `source_id`.
pub fn result_set_path(work_dir: &Path, source_id: &str) -> PathBuf {
    work_dir.join(format!("{}.json", source_id))
}

/// Path of the run artifact for `source_id`.
pub fn run_artifact_path(work_dir: &Path, source_id: &str) -> PathBuf {
    work_dir.join(format!("{}{}", source_id, RUN_ARTIFACT_SUFFIX))
}

/// Source id encoded in a run artifact's file name.
pub fn source_id_from_path(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    name.strip_suffix(RUN_ARTIFACT_SUFFIX)
        .or_else(|| name.strip_suffix(".json"))
        .unwrap_or(name)
        .to_string()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
        }
    }
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let data = serde_json::to_string_pretty(value)
        .map_err(|e| EvalError::Serialization(e.to_string()))?;
    fs::write(path, data).map_err(|e| EvalError::io(path, e))
}

/// Save collected results as a JSON array of `{query, object}`.
pub fn save_result_set(results: &ResultSet, path: &Path) -> Result<()> {
    write_json(results, path)
}

/// Load collected results saved by [`save_result_set`].
pub fn load_result_set(path: &Path) -> Result<ResultSet> {
    let data = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    serde_json::from_str(&data).map_err(|e| EvalError::Serialization(e.to_string()))
}

/// Write a completed job status to `path`.
pub fn save_run_artifact(raw: &Value, path: &Path) -> Result<()> {
    write_json(raw, path)
}

/// Rebuild an evaluation run from a saved artifact.
///
/// The source id is taken from the file name (`<source>_eval.json`).
pub fn load_run(path: &Path) -> Result<EvaluationRun> {
    if !path.exists() {
        return Err(EvalError::ArtifactNotFound(path.to_path_buf()));
    }

    let data = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let raw: Value =
        serde_json::from_str(&data).map_err(|e| EvalError::Serialization(e.to_string()))?;

    let status = JobStatus::parse(200, raw)?;
    Ok(EvaluationRun {
        source_id: source_id_from_path(path),
        judgments: status.judgments()?,
    })
}

/// Find all run artifacts under `dir`, sorted by path.
pub fn find_run_artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::ArtifactNotFound(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(RUN_ARTIFACT_SUFFIX))
        })
        .map(|entry| entry.into_path())
        .collect();

    paths.sort();
    Ok(paths)
}

/// Drop paths that name a file already listed, keeping the first occurrence.
///
/// Paths are compared after canonicalization, so `work/x_eval.json` and
/// `./work/x_eval.json` count as the same artifact.
pub fn dedup_paths(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|path| seen.insert(fs::canonicalize(path).unwrap_or_else(|_| path.clone())))
        .collect()
}

/// Remove and recreate the work directory.
pub fn reset_work_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| EvalError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| EvalError::io(dir, e))
}
