//! Filesystem utilities: cross-device moves, job-scoped names, cleanup and
//! age-based sweeping.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-to-temp, rename, delete when
/// the two paths are on different filesystems (EXDEV).
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Cross-device rename, falling back to copy+delete"
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Temp file sits next to dst so the final rename stays on one filesystem
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        remove_quietly(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    if let Err(e) = fs::remove_file(src).await {
        warn!(
            src = %src.display(),
            error = %e,
            "Failed to remove source after cross-device move"
        );
    }
    Ok(())
}

/// `<prefix>_<uuid>.<ext>`
pub fn unique_file_name(prefix: &str, extension: &str) -> String {
    format!("{}_{}.{}", prefix, uuid::Uuid::new_v4().simple(), extension)
}

/// `dir/<prefix>_<uuid>.<ext>`
pub fn unique_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    dir.join(unique_file_name(prefix, extension))
}

/// Remove a file, ignoring "not found" and logging anything else.
pub async fn remove_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

/// Remove a directory tree, ignoring "not found" and logging anything else.
pub async fn remove_dir_quietly(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match fs::remove_dir_all(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove directory"),
    }
}

/// Outcome of one sweep over a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub files_removed: u64,
    pub dirs_removed: u64,
    pub bytes_freed: u64,
}

impl SweepStats {
    fn absorb(&mut self, other: SweepStats) {
        self.files_removed += other.files_removed;
        self.dirs_removed += other.dirs_removed;
        self.bytes_freed += other.bytes_freed;
    }
}

/// Delete entries under `dir` whose modification time is older than `max_age`.
///
/// Files are removed individually; subdirectories whose own mtime is older
/// than `max_age` are removed whole. A missing `dir` is an empty sweep.
pub async fn sweep_older_than(dir: impl AsRef<Path>, max_age: Duration) -> MediaResult<SweepStats> {
    let dir = dir.as_ref();
    let mut stats = SweepStats::default();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(stats),
        Err(e) => return Err(e.into()),
    };

    let now = SystemTime::now();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        if meta.is_dir() {
            let size = dir_size(&path).await;
            match fs::remove_dir_all(&path).await {
                Ok(()) => stats.absorb(SweepStats {
                    files_removed: 0,
                    dirs_removed: 1,
                    bytes_freed: size,
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep directory"),
            }
        } else {
            match fs::remove_file(&path).await {
                Ok(()) => stats.absorb(SweepStats {
                    files_removed: 1,
                    dirs_removed: 0,
                    bytes_freed: meta.len(),
                }),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep file"),
            }
        }
    }

    Ok(stats)
}

/// Total size of regular files under `dir` (best effort).
async fn dir_size(dir: &Path) -> u64 {
    let mut total = 0;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(mut entries) = fs::read_dir(&current).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            match entry.metadata().await {
                Ok(meta) if meta.is_dir() => stack.push(entry.path()),
                Ok(meta) => total += meta.len(),
                Err(_) => {}
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("nested").join("dest.txt");

        fs::write(&src, b"test content").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");

        fs::write(&src, b"new").await.unwrap();
        fs::write(&dst, b"old").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new");
    }

    #[test]
    fn test_cross_device_detection() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[test]
    fn test_unique_names_differ() {
        let a = unique_file_name("audio", "m4a");
        let b = unique_file_name("audio", "m4a");
        assert_ne!(a, b);
        assert!(a.starts_with("audio_") && a.ends_with(".m4a"));
    }

    #[tokio::test]
    async fn test_remove_quietly_ignores_missing() {
        let dir = TempDir::new().unwrap();
        remove_quietly(dir.path().join("nope")).await;
        remove_dir_quietly(dir.path().join("nope_dir")).await;
    }

    #[tokio::test]
    async fn test_sweep_respects_age() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.mp4"), vec![0u8; 10]).await.unwrap();
        fs::create_dir(dir.path().join("job")).await.unwrap();
        fs::write(dir.path().join("job").join("f.png"), vec![0u8; 5])
            .await
            .unwrap();

        // Nothing is a day old yet
        let stats = sweep_older_than(dir.path(), Duration::from_secs(86_400))
            .await
            .unwrap();
        assert_eq!(stats, SweepStats::default());

        // Everything is at least zero seconds old
        let stats = sweep_older_than(dir.path(), Duration::ZERO).await.unwrap();
        assert_eq!(stats.files_removed, 1);
        assert_eq!(stats.dirs_removed, 1);
        assert_eq!(stats.bytes_freed, 15);
        assert!(!dir.path().join("a.mp4").exists());
    }

    #[tokio::test]
    async fn test_sweep_missing_dir() {
        let stats = sweep_older_than("/definitely/not/here", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(stats, SweepStats::default());
    }
}
