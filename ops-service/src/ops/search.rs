//! Search engine: regex search over one file or a directory tree, with
//! bounded recursion and a binary-content heuristic.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::OpsError;
use crate::ops::StreamSender;

/// Subtrees deeper than this are skipped (and logged), not an error.
const MAX_SEARCH_DEPTH: usize = 10;

/// Bytes sampled from the head of each file for the binary heuristic.
const BINARY_SAMPLE_SIZE: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepMatch {
    pub file_path: String,
    /// 1-based.
    pub line_number: usize,
    pub line_content: String,
    /// Byte offsets of the match within the line.
    pub match_start: usize,
    pub match_end: usize,
    pub matched_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepResult {
    pub pattern: String,
    pub path: String,
    pub recursive: bool,
    pub matches: Vec<GrepMatch>,
    pub total_matches: usize,
    pub files_searched: usize,
}

/// Search `path` for `pattern` and aggregate every match.
pub async fn grep(
    pattern: &str,
    path: &str,
    recursive: bool,
    case_sensitive: bool,
) -> Result<GrepResult, OpsError> {
    let regex = compile_pattern(pattern, case_sensitive)?;
    let search_path = super::files::normalize(path);
    if !fs::try_exists(&search_path).await? {
        return Err(OpsError::PathNotFound(path.to_string()));
    }

    let mut matches = Vec::new();
    let mut files_searched = 0usize;

    for file in target_files(&search_path, recursive).await? {
        files_searched += 1;
        match matches_in_file(&file, &regex).await {
            Ok(file_matches) => matches.extend(file_matches),
            Err(err) => warn!(path = %file.display(), %err, "skipping unreadable file"),
        }
    }

    let total_matches = matches.len();
    Ok(GrepResult {
        pattern: pattern.to_string(),
        path: path.to_string(),
        recursive,
        matches,
        total_matches,
        files_searched,
    })
}

/// Streaming variant of [`grep`]: one match per chunk.
pub async fn grep_stream(
    pattern: &str,
    path: &str,
    recursive: bool,
    case_sensitive: bool,
    tx: &StreamSender,
) -> Result<(), OpsError> {
    let regex = compile_pattern(pattern, case_sensitive)?;
    let search_path = super::files::normalize(path);
    if !fs::try_exists(&search_path).await? {
        return Err(OpsError::PathNotFound(path.to_string()));
    }

    for file in target_files(&search_path, recursive).await? {
        match matches_in_file(&file, &regex).await {
            Ok(file_matches) => {
                for grep_match in file_matches {
                    tx.data(serde_json::to_value(grep_match)?).await?;
                }
            }
            Err(err) => warn!(path = %file.display(), %err, "skipping unreadable file"),
        }
    }
    Ok(())
}

fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex, OpsError> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|err| OpsError::InvalidPattern(format!("{pattern}: {err}")))
}

/// Collect the regular files to search: the target itself, a directory's
/// immediate children, or the tree up to [`MAX_SEARCH_DEPTH`].
async fn target_files(search_path: &Path, recursive: bool) -> Result<Vec<PathBuf>, OpsError> {
    let metadata = fs::metadata(search_path).await?;
    if metadata.is_file() {
        return Ok(vec![search_path.to_path_buf()]);
    }
    if !metadata.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut pending = vec![(search_path.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = pending.pop() {
        if depth > MAX_SEARCH_DEPTH {
            warn!(path = %dir.display(), "maximum search depth exceeded, skipping subtree");
            continue;
        }

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), %err, "skipping unreadable directory");
                continue;
            }
        };
        while let Some(entry) = entries.next_entry().await? {
            let entry_type = match entry.file_type().await {
                Ok(entry_type) => entry_type,
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "skipping entry");
                    continue;
                }
            };
            if entry_type.is_file() {
                files.push(entry.path());
            } else if entry_type.is_dir() && recursive {
                pending.push((entry.path(), depth + 1));
            }
        }
    }
    Ok(files)
}

/// All matches in one file, in line-then-column order. Binary files yield
/// no matches.
async fn matches_in_file(path: &Path, regex: &Regex) -> Result<Vec<GrepMatch>, OpsError> {
    let bytes = fs::read(path).await?;
    if !looks_like_text(&bytes) {
        return Ok(Vec::new());
    }

    let content = String::from_utf8_lossy(&bytes);
    let mut matches = Vec::new();
    for (index, line) in content.lines().enumerate() {
        for found in regex.find_iter(line) {
            matches.push(GrepMatch {
                file_path: path.display().to_string(),
                line_number: index + 1,
                line_content: line.to_string(),
                match_start: found.start(),
                match_end: found.end(),
                matched_text: found.as_str().to_string(),
            });
        }
    }
    Ok(matches)
}

/// Binary heuristic: sample the first 512 bytes and treat the file as
/// binary when at least 1% of the sample is NUL. Empty files are text.
fn looks_like_text(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(BINARY_SAMPLE_SIZE)];
    if sample.is_empty() {
        return true;
    }
    let nul_count = sample.iter().filter(|byte| **byte == 0).count();
    (nul_count as f64 / sample.len() as f64) < 0.01
}
