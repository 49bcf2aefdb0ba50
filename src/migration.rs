//! One-off rewrite of legacy quiz files.
//!
//! Older quiz bundles store choices as bare strings:
//!
//! ```json
//! "choices": ["useState", "useEffect"]
//! ```
//!
//! The current shape is an object per choice:
//!
//! ```json
//! "choices": [{"choice": "useState", "choiceExplanation": ""}]
//! ```

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Converted,
    /// Already in the current shape, or nothing to convert.
    Skipped,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub files: Vec<(PathBuf, FileOutcome)>,
}

impl MigrationReport {
    fn count(&self, wanted: fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|(_, outcome)| wanted(outcome)).count()
    }

    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Converted))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }
}

/// Convert legacy string choices in place. Returns whether anything changed.
///
/// A question is converted when its first choice is a string; string
/// elements become objects with an empty explanation, anything else is kept.
pub fn upgrade_choices(quiz: &mut Value) -> bool {
    let Some(questions) = quiz.get_mut("questions").and_then(Value::as_array_mut) else {
        return false;
    };

    let mut modified = false;
    for question in questions {
        let Some(choices) = question.get_mut("choices").and_then(Value::as_array_mut) else {
            continue;
        };
        if !choices.first().is_some_and(Value::is_string) {
            continue;
        }
        for choice in choices.iter_mut() {
            if let Value::String(text) = choice {
                let mut upgraded = Map::new();
                upgraded.insert("choice".into(), Value::String(std::mem::take(text)));
                upgraded.insert("choiceExplanation".into(), json!(""));
                *choice = Value::Object(upgraded);
            }
        }
        modified = true;
    }
    modified
}

async fn migrate_file(path: &Path) -> Result<FileOutcome> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let mut quiz: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", path.display()))?;

    if !upgrade_choices(&mut quiz) {
        return Ok(FileOutcome::Skipped);
    }
    let rewritten = serde_json::to_string_pretty(&quiz)?;
    fs::write(path, rewritten)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(FileOutcome::Converted)
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Migrate every `.json` file directly inside `dir`, in name order.
///
/// Failures are recorded per file and never stop the run. Only an unreadable
/// directory is an error.
pub async fn migrate_directory(dir: &Path) -> Result<MigrationReport> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("reading directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_json_file(&path) && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut report = MigrationReport::default();
    for path in paths {
        let outcome = match migrate_file(&path).await {
            Ok(outcome) => outcome,
            Err(err) => FileOutcome::Failed(format!("{:#}", err)),
        };
        match &outcome {
            FileOutcome::Converted => info!("converted {}", path.display()),
            FileOutcome::Skipped => info!("skipped {} (nothing to convert)", path.display()),
            FileOutcome::Failed(reason) => error!("failed {}: {}", path.display(), reason),
        }
        report.files.push((path, outcome));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_upgrade_converts_string_choices() {
        let mut quiz = json!({
            "metadata": {"title": "React Basics"},
            "questions": [
                {"id": 1, "choices": ["a", "b"]},
                {"id": 2, "choices": [{"choice": "c", "choiceExplanation": "why"}]},
                {"id": 3}
            ]
        });
        assert!(upgrade_choices(&mut quiz));
        assert_eq!(
            quiz["questions"][0]["choices"],
            json!([
                {"choice": "a", "choiceExplanation": ""},
                {"choice": "b", "choiceExplanation": ""}
            ])
        );
        assert_eq!(quiz["questions"][1]["choices"][0]["choiceExplanation"], "why");
        assert!(!upgrade_choices(&mut quiz));
    }

    #[test]
    fn test_upgrade_without_questions() {
        assert!(!upgrade_choices(&mut json!({"metadata": {}})));
        assert!(!upgrade_choices(&mut json!({"questions": "nope"})));
        assert!(!upgrade_choices(&mut json!({"questions": [{"choices": []}]})));
    }

    #[tokio::test]
    async fn test_migrate_directory_reports_each_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a_legacy.json"), r#"{"questions":[{"choices":["x","y"]}]}"#)
            .unwrap();
        std::fs::write(
            root.join("b_current.JSON"),
            r#"{"questions":[{"choices":[{"choice":"x","choiceExplanation":""}]}]}"#,
        )
        .unwrap();
        std::fs::write(root.join("c_broken.json"), "{not json").unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let report = migrate_directory(root).await.unwrap();
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.converted(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.files[0].1, FileOutcome::Converted);

        let rewritten = std::fs::read_to_string(root.join("a_legacy.json")).unwrap();
        assert!(rewritten.contains("\n  \"questions\""));
        let value: Value = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(value["questions"][0]["choices"][1]["choice"], "y");
        assert_eq!(
            std::fs::read_to_string(root.join("c_broken.json")).unwrap(),
            "{not json"
        );
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(migrate_directory(&dir.path().join("absent")).await.is_err());
    }
}
