//! Filesystem helpers for staged uploads and encode output.

use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-then-delete on EXDEV. The
/// copy goes through a temp file next to `dst` so the final rename is atomic.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
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
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// List every regular file under `root`, sorted for stable upload order.
pub async fn list_files_recursive(root: impl AsRef<Path>) -> MediaResult<Vec<PathBuf>> {
    let root = root.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok::<_, MediaError>(files)
    })
    .await
    .map_err(|e| MediaError::internal(format!("directory walk task failed: {e}")))?
}

/// Remove a directory tree, treating an already-missing tree as success.
pub async fn remove_dir_all_if_exists(dir: impl AsRef<Path>) -> MediaResult<()> {
    match fs::remove_dir_all(dir.as_ref()).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_renames_with_extension() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("abc.part");
        let dst = dir.path().join("abc.mp4");

        fs::write(&src, b"raw video").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"raw video");
    }

    #[tokio::test]
    async fn test_move_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.bin");
        let dst = dir.path().join("nested").join("dest.bin");

        fs::write(&src, b"x").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(dst.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }

    #[tokio::test]
    async fn test_list_files_recursive_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("master.m3u8"), b"#EXTM3U").await.unwrap();
        fs::create_dir_all(dir.path().join("v0")).await.unwrap();
        fs::create_dir_all(dir.path().join("v1")).await.unwrap();
        fs::write(dir.path().join("v0/prog_index.m3u8"), b"").await.unwrap();
        fs::write(dir.path().join("v0/fileSequence0.ts"), b"").await.unwrap();

        let files = list_files_recursive(dir.path()).await.unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(
            rel,
            vec!["master.m3u8", "v0/fileSequence0.ts", "v0/prog_index.m3u8"]
        );
    }

    #[tokio::test]
    async fn test_list_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let result = list_files_recursive(dir.path().join("missing")).await;
        assert!(matches!(result, Err(MediaError::Io(_))));
    }

    #[tokio::test]
    async fn test_remove_dir_all_if_exists() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("job");
        fs::create_dir_all(target.join("v0")).await.unwrap();

        remove_dir_all_if_exists(&target).await.unwrap();
        assert!(!target.exists());
        remove_dir_all_if_exists(&target).await.unwrap();
    }
}
