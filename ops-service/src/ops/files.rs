//! File engine: directory listing, whole-file and chunked reads, and
//! create/edit/append writes.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::OpsError;
use crate::ops::StreamSender;

/// Window size for streamed file reads, in characters.
const STREAM_CHUNK_SIZE: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub path: String,
    pub files: Vec<FileInfo>,
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub permissions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
    /// Character count of the decoded content, not the byte length.
    pub size: usize,
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModification {
    pub path: String,
    pub operation: String,
    pub success: bool,
    pub message: String,
    pub bytes_written: u64,
}

/// Lexically normalize a path: strip `.` components and fold `..` into the
/// preceding segment. Symbolic links are not resolved.
pub fn normalize(path: &str) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(Component::ParentDir);
                }
            }
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

/// List files and subdirectories of `path` in a single flat sequence.
/// Entry order is whatever the OS returns; callers must not depend on it.
pub async fn list_directory(path: &str) -> Result<DirectoryListing, OpsError> {
    let dir_path = normalize(path);
    ensure_directory(&dir_path, path).await?;

    let mut files = Vec::new();
    let mut entries = fs::read_dir(&dir_path).await?;
    while let Some(entry) = entries.next_entry().await? {
        match file_info(&entry.path()).await {
            Ok(info) => files.push(info),
            Err(err) => {
                warn!(path = %entry.path().display(), %err, "skipping unreadable directory entry");
            }
        }
    }

    let total_count = files.len();
    Ok(DirectoryListing {
        path: dir_path.display().to_string(),
        files,
        total_count,
    })
}

/// Streaming variant of [`list_directory`]: one [`FileInfo`] per chunk.
pub async fn list_directory_stream(path: &str, tx: &StreamSender) -> Result<(), OpsError> {
    let dir_path = normalize(path);
    ensure_directory(&dir_path, path).await?;

    let mut entries = fs::read_dir(&dir_path).await?;
    while let Some(entry) = entries.next_entry().await? {
        match file_info(&entry.path()).await {
            Ok(info) => tx.data(serde_json::to_value(info)?).await?,
            Err(err) => {
                warn!(path = %entry.path().display(), %err, "skipping unreadable directory entry");
            }
        }
    }
    Ok(())
}

/// Read a whole file as UTF-8.
pub async fn read_file(path: &str) -> Result<FileContent, OpsError> {
    let file_path = normalize(path);
    ensure_file(&file_path, path).await?;

    let content = fs::read_to_string(&file_path).await?;
    let size = content.chars().count();
    Ok(FileContent {
        path: file_path.display().to_string(),
        content,
        size,
        encoding: "UTF-8".to_string(),
    })
}

/// Streaming variant of [`read_file`]: fixed 1024-character windows of the
/// content, in order. An empty file yields no content chunks.
pub async fn read_file_stream(path: &str, tx: &StreamSender) -> Result<(), OpsError> {
    let file_path = normalize(path);
    ensure_file(&file_path, path).await?;

    let content = fs::read_to_string(&file_path).await?;
    for window in char_windows(&content, STREAM_CHUNK_SIZE) {
        tx.data(serde_json::Value::String(window.to_string())).await?;
    }
    Ok(())
}

/// Create a new file, materializing missing parent directories. Fails if
/// the target already exists.
pub async fn create_file(path: &str, content: &str) -> Result<FileModification, OpsError> {
    let file_path = normalize(path);
    if fs::try_exists(&file_path).await? {
        return Err(OpsError::FileExists(path.to_string()));
    }

    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() && !fs::try_exists(parent).await? {
            fs::create_dir_all(parent).await?;
        }
    }

    fs::write(&file_path, content).await?;
    Ok(FileModification {
        path: file_path.display().to_string(),
        operation: "create".to_string(),
        success: true,
        message: "File created successfully".to_string(),
        bytes_written: content.len() as u64,
    })
}

/// Overwrite an existing file with new content.
pub async fn edit_file(path: &str, content: &str) -> Result<FileModification, OpsError> {
    let file_path = normalize(path);
    ensure_file(&file_path, path).await?;

    fs::write(&file_path, content).await?;
    Ok(FileModification {
        path: file_path.display().to_string(),
        operation: "edit".to_string(),
        success: true,
        message: "File edited successfully".to_string(),
        bytes_written: content.len() as u64,
    })
}

/// Append content to an existing file.
pub async fn append_file(path: &str, content: &str) -> Result<FileModification, OpsError> {
    let file_path = normalize(path);
    ensure_file(&file_path, path).await?;

    let mut options = fs::OpenOptions::new();
    options.append(true);
    let mut file = options.open(&file_path).await?;
    tokio::io::AsyncWriteExt::write_all(&mut file, content.as_bytes()).await?;

    Ok(FileModification {
        path: file_path.display().to_string(),
        operation: "append".to_string(),
        success: true,
        message: "Content appended successfully".to_string(),
        bytes_written: content.len() as u64,
    })
}

async fn ensure_directory(normalized: &Path, original: &str) -> Result<(), OpsError> {
    if !fs::try_exists(normalized).await? {
        return Err(OpsError::PathNotFound(original.to_string()));
    }
    if !fs::metadata(normalized).await?.is_dir() {
        return Err(OpsError::NotADirectory(original.to_string()));
    }
    Ok(())
}

async fn ensure_file(normalized: &Path, original: &str) -> Result<(), OpsError> {
    if !fs::try_exists(normalized).await? {
        return Err(OpsError::PathNotFound(original.to_string()));
    }
    if fs::metadata(normalized).await?.is_dir() {
        return Err(OpsError::NotAFile(original.to_string()));
    }
    Ok(())
}

async fn file_info(path: &Path) -> Result<FileInfo, OpsError> {
    // fs::metadata follows symlinks, so links are described by their target.
    let metadata = fs::metadata(path).await?;
    let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);

    Ok(FileInfo {
        name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.display().to_string(),
        kind: if metadata.is_dir() { "directory" } else { "file" }.to_string(),
        size: metadata.len(),
        last_modified: DateTime::<Utc>::from(modified),
        permissions: permissions_string(&metadata),
    })
}

/// POSIX-style `rwxrwxrwx` triple where the platform supports it, else a
/// read/write/execute triple derived from what the metadata exposes.
#[cfg(unix)]
fn permissions_string(metadata: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permissions_string(metadata: &std::fs::Metadata) -> String {
    let writable = !metadata.permissions().readonly();
    format!("r{}-", if writable { 'w' } else { '-' })
}

/// Split `content` into windows of at most `size` characters, respecting
/// UTF-8 boundaries.
fn char_windows(content: &str, size: usize) -> impl Iterator<Item = &str> {
    let mut rest = content;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let split = rest
            .char_indices()
            .nth(size)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        let (window, remainder) = rest.split_at(split);
        rest = remainder;
        Some(window)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path_str(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).display().to_string()
    }

    #[test]
    fn test_normalize_strips_dot_segments() {
        assert_eq!(normalize("/tmp/./a/../b"), PathBuf::from("/tmp/b"));
        assert_eq!(normalize("."), PathBuf::from("."));
        assert_eq!(normalize("a/b/.."), PathBuf::from("a"));
    }

    #[test]
    fn test_char_windows_boundaries() {
        let exact: String = "x".repeat(2048);
        assert_eq!(char_windows(&exact, 1024).count(), 2);

        let uneven: String = "x".repeat(1025);
        let windows: Vec<&str> = char_windows(&uneven, 1024).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].len(), 1);

        assert_eq!(char_windows("", 1024).count(), 0);

        // Multi-byte characters must not be split.
        let snowmen: String = "☃".repeat(1500);
        let windows: Vec<&str> = char_windows(&snowmen, 1024).collect();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].chars().count(), 1024);
    }

    #[tokio::test]
    async fn test_create_then_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "notes.txt");

        let created = create_file(&path, "hello world").await.unwrap();
        assert!(created.success);
        assert_eq!(created.operation, "create");
        assert_eq!(created.bytes_written, 11);

        let read = read_file(&path).await.unwrap();
        assert_eq!(read.content, "hello world");
        assert_eq!(read.size, 11);
        assert_eq!(read.encoding, "UTF-8");
    }

    #[tokio::test]
    async fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "dup.txt");
        create_file(&path, "first").await.unwrap();

        let err = create_file(&path, "second").await.unwrap_err();
        assert!(matches!(err, OpsError::FileExists(_)));
    }

    #[tokio::test]
    async fn test_create_materializes_parents() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "a/b/c.txt");

        create_file(&path, "nested").await.unwrap();
        assert_eq!(read_file(&path).await.unwrap().content, "nested");
    }

    #[tokio::test]
    async fn test_edit_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "absent.txt");

        let err = edit_file(&path, "content").await.unwrap_err();
        assert!(matches!(err, OpsError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn test_edit_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "file.txt");
        create_file(&path, "old").await.unwrap();

        edit_file(&path, "new").await.unwrap();
        assert_eq!(read_file(&path).await.unwrap().content, "new");
    }

    #[tokio::test]
    async fn test_append_accumulates() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "log.txt");
        create_file(&path, "base").await.unwrap();

        append_file(&path, "+one").await.unwrap();
        append_file(&path, "+two").await.unwrap();
        assert_eq!(read_file(&path).await.unwrap().content, "base+one+two");
    }

    #[tokio::test]
    async fn test_read_size_is_char_count() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "unicode.txt");
        create_file(&path, "héllo").await.unwrap();

        let read = read_file(&path).await.unwrap();
        assert_eq!(read.size, 5);
        assert_eq!(read.content.len(), 6);
    }

    #[tokio::test]
    async fn test_read_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = read_file(&dir.path().display().to_string()).await.unwrap_err();
        assert!(matches!(err, OpsError::NotAFile(_)));
    }

    #[tokio::test]
    async fn test_list_directory_contains_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        create_file(&path_str(&dir, "a.txt"), "a").await.unwrap();
        fs::create_dir(dir.path().join("sub")).await.unwrap();

        let listing = list_directory(&dir.path().display().to_string())
            .await
            .unwrap();
        assert_eq!(listing.total_count, 2);

        let kinds: Vec<(String, String)> = listing
            .files
            .iter()
            .map(|f| (f.name.clone(), f.kind.clone()))
            .collect();
        assert!(kinds.contains(&("a.txt".to_string(), "file".to_string())));
        assert!(kinds.contains(&("sub".to_string(), "directory".to_string())));
    }

    #[tokio::test]
    async fn test_list_directory_rejects_file_target() {
        let dir = TempDir::new().unwrap();
        let path = path_str(&dir, "plain.txt");
        create_file(&path, "x").await.unwrap();

        let err = list_directory(&path).await.unwrap_err();
        assert!(matches!(err, OpsError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_permissions_are_posix_triples() {
        let dir = TempDir::new().unwrap();
        create_file(&path_str(&dir, "p.txt"), "x").await.unwrap();

        let listing = list_directory(&dir.path().display().to_string())
            .await
            .unwrap();
        let perms = &listing.files[0].permissions;
        assert_eq!(perms.len(), 9);
        assert!(perms.chars().all(|c| "rwx-".contains(c)));
    }
}
