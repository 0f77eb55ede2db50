use crate::model::TestCase;
use crate::report::console;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

const KNOWN_KEYS: &[&str] = &["name", "prompt", "sql"];

#[derive(Debug, Clone, PartialEq)]
pub struct CaseError(pub String);

impl fmt::Display for CaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CaseError {}

#[derive(Debug, Deserialize)]
struct CaseFile {
    name: Option<String>,
    prompt: String,
    sql: Option<String>,
}

pub fn load_case(path: &Path) -> Result<TestCase, CaseError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CaseError(format!("failed to read {}: {}", path.display(), e)))?;

    let mut ignored = BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);
    let file: CaseFile = serde_ignored::deserialize(deserializer, |p| {
        ignored.insert(p.to_string());
    })
    .map_err(|e| CaseError(format!("failed to parse YAML: {}", e)))?;

    for key in &ignored {
        match suggest_key(key) {
            Some(hint) => tracing::warn!(
                event = "case_unknown_key",
                file = %path.display(),
                key = %key,
                "unknown key '{}' (did you mean '{}'?)", key, hint
            ),
            None => tracing::warn!(
                event = "case_unknown_key",
                file = %path.display(),
                key = %key,
                "unknown key '{}'", key
            ),
        }
    }

    let name = file.name.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    Ok(TestCase {
        name,
        prompt: file.prompt,
        sql: file.sql,
        file_path: path.to_path_buf(),
    })
}

fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .copied()
        .filter(|k| strsim::levenshtein(k, key) <= 2)
        .min_by_key(|k| strsim::levenshtein(k, key))
}

/// Collects `*.yml` and `*.yaml` files from the tests folder, sorted by path.
pub fn list_case_files(tests_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(tests_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yml" || e == "yaml");
        if is_yaml {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every test case under `<project>/tests`. Problems are reported per
/// item and never abort discovery; an empty result means nothing to run.
pub fn discover_tests(project: &Path) -> Vec<TestCase> {
    let tests_dir = crate::config::tests_dir(project);

    if !tests_dir.is_dir() {
        console::warn(&format!("Tests folder not found: {}", tests_dir.display()));
        return Vec::new();
    }

    let files = match list_case_files(&tests_dir) {
        Ok(files) => files,
        Err(e) => {
            console::error(&format!("Failed to read {}: {}", tests_dir.display(), e));
            return Vec::new();
        }
    };

    if files.is_empty() {
        console::warn(&format!("No test files found in {}", tests_dir.display()));
        return Vec::new();
    }

    let mut cases = Vec::new();
    for path in files {
        match load_case(&path) {
            Ok(tc) => cases.push(tc),
            Err(e) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                console::error(&format!("Failed to load {}: {}", file_name, e));
            }
        }
    }
    cases
}
