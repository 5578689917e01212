//! Plain directory tree storage

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::backend::{Storage, StorageLoader};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

pub const NAME: &str = "fs";

#[cfg(unix)]
const FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Stores every entry as a file below a root directory
#[derive(Debug, Clone)]
pub struct FsStorage {
    path: PathBuf,
}

impl FsStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn full(&self, name: &str) -> PathBuf {
        let mut full = self.path.clone();
        for segment in name.split('/').filter(|s| !s.is_empty()) {
            full.push(segment);
        }
        full
    }

    /// Create the root directory with restrictive permissions
    pub async fn create(&self) -> StoreResult<()> {
        create_dirs(&self.path).await
    }

    /// Remove empty directories between `dir` and the storage root
    async fn remove_empty_parents(&self, mut dir: Option<&Path>) {
        while let Some(d) = dir {
            if d == self.path || !d.starts_with(&self.path) {
                break;
            }
            // fails if the directory is not empty, which ends the climb
            if tokio::fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

async fn create_dirs(path: &Path) -> StoreResult<()> {
    tokio::fs::create_dir_all(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(DIR_MODE)).await?;
    }
    Ok(())
}

/// Collect relative file names below `dir`, sorted
///
/// Hidden entries (leading `.`) are skipped unless `hidden` is set.
fn walk(root: &Path, dir: &Path, hidden: bool, out: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if !hidden && file_name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(root, &path, hidden, out)?;
            continue;
        }
        if let Ok(rel) = path.strip_prefix(root) {
            let name: Vec<_> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(name.join("/"));
        }
    }
    Ok(())
}

fn not_found(name: &str, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl Storage for FsStorage {
    fn name(&self) -> &str {
        NAME
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self, name: &str) -> bool {
        self.full(name).exists()
    }

    fn is_dir(&self, name: &str) -> bool {
        self.full(name).is_dir()
    }

    async fn get(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<u8>> {
        ctx.cancellation().check()?;
        let full = self.full(name);
        if full.is_dir() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        tokio::fs::read(&full).await.map_err(|e| not_found(name, e))
    }

    async fn set(&self, ctx: &OpContext, name: &str, value: &[u8]) -> StoreResult<()> {
        ctx.cancellation().check()?;
        let full = self.full(name);
        if let Some(parent) = full.parent() {
            create_dirs(parent).await?;
        }

        let file_name = full
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::InvalidName(name.to_string()))?;
        let tmp = full.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()));
        tokio::fs::write(&tmp, value).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(FILE_MODE)).await?;
        }
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %full.display(), "wrote entry");
        Ok(())
    }

    async fn delete(&self, ctx: &OpContext, name: &str) -> StoreResult<()> {
        ctx.cancellation().check()?;
        let full = self.full(name);
        tokio::fs::remove_file(&full).await.map_err(|e| not_found(name, e))?;
        self.remove_empty_parents(full.parent()).await;
        Ok(())
    }

    async fn list(&self, ctx: &OpContext, prefix: &str) -> StoreResult<Vec<String>> {
        ctx.cancellation().check()?;
        let mut names = Vec::new();
        walk(&self.path, &self.path, false, &mut names)?;
        names.retain(|n| n.starts_with(prefix));
        names.sort();
        Ok(names)
    }

    async fn prune(&self, ctx: &OpContext, prefix: &str) -> StoreResult<()> {
        ctx.cancellation().check()?;
        let full = self.full(prefix);
        if full == self.path {
            return Err(StoreError::InvalidName(prefix.to_string()));
        }
        let meta = tokio::fs::metadata(&full).await.map_err(|e| not_found(prefix, e))?;
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
        } else {
            tokio::fs::remove_file(&full).await?;
        }
        self.remove_empty_parents(full.parent()).await;
        Ok(())
    }

    async fn fsck(&self, ctx: &OpContext) -> StoreResult<Vec<String>> {
        ctx.cancellation().check()?;
        let mut problems = Vec::new();
        if !self.path.is_dir() {
            problems.push(format!("storage root {} is missing", self.path.display()));
            return Ok(problems);
        }

        let mut names = Vec::new();
        walk(&self.path, &self.path, true, &mut names)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for name in names.iter().filter(|n| !n.starts_with(".git/")) {
                let mode = tokio::fs::metadata(self.full(name)).await?.permissions().mode();
                if mode & 0o077 != 0 {
                    warn!(entry = %name, mode = %format!("{:o}", mode & 0o777), "entry is accessible by other users");
                    problems.push(format!("{}: permissions {:o} are too open", name, mode & 0o777));
                }
            }
        }

        let mut dirs = Vec::new();
        collect_dirs(&self.path, &mut dirs)?;
        // deepest first so parents emptied by the sweep are removed too
        dirs.sort_by(|a, b| b.components().count().cmp(&a.components().count()));
        for dir in dirs {
            if tokio::fs::remove_dir(&dir).await.is_ok() {
                debug!(path = %dir.display(), "removed empty directory");
            }
        }
        Ok(problems)
    }
}

fn collect_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            let path = entry.path();
            collect_dirs(&path, out)?;
            out.push(path);
        }
    }
    Ok(())
}

/// Loader for [`FsStorage`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

#[async_trait]
impl StorageLoader for FsLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        50
    }

    fn handles(&self, path: &Path) -> StoreResult<()> {
        if path.is_dir() {
            Ok(())
        } else {
            Err(StoreError::BackendNotDetected(path.to_path_buf()))
        }
    }

    async fn new(&self, _ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        if !path.is_dir() {
            return Err(StoreError::NotInitialized(path.to_path_buf()));
        }
        Ok(Arc::new(FsStorage::new(path)))
    }

    async fn init(&self, _ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        let storage = FsStorage::new(path);
        storage.create().await?;
        debug!(path = %path.display(), "initialized fs storage");
        Ok(Arc::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = FsStorage::new(dir.path());

        storage.set(&ctx, "web/github.txt", b"hunter2").await.unwrap();
        assert!(storage.exists("web/github.txt"));
        assert!(storage.is_dir("web"));
        assert_eq!(storage.get(&ctx, "web/github.txt").await.unwrap(), b"hunter2");

        storage.delete(&ctx, "web/github.txt").await.unwrap();
        assert!(!storage.exists("web/github.txt"));
        // the emptied folder is cleaned up
        assert!(!storage.exists("web"));
        assert!(storage.get(&ctx, "web/github.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_skips_hidden() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = FsStorage::new(dir.path());

        for name in ["b.txt", "a/c.txt", ".gpg-id", "a/.hidden"] {
            storage.set(&ctx, name, b"x").await.unwrap();
        }
        assert_eq!(storage.list(&ctx, "").await.unwrap(), vec!["a/c.txt", "b.txt"]);
        assert_eq!(storage.list(&ctx, "a/").await.unwrap(), vec!["a/c.txt"]);
    }

    #[tokio::test]
    async fn test_prune_folder() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = FsStorage::new(dir.path());

        storage.set(&ctx, "a/b/c.txt", b"x").await.unwrap();
        storage.set(&ctx, "a/d.txt", b"x").await.unwrap();
        storage.set(&ctx, "e.txt", b"x").await.unwrap();
        storage.prune(&ctx, "a").await.unwrap();
        assert_eq!(storage.list(&ctx, "").await.unwrap(), vec!["e.txt"]);
        assert!(storage.prune(&ctx, "a").await.unwrap_err().is_not_found());
        assert!(storage.prune(&ctx, "").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fsck_reports_open_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = FsStorage::new(dir.path());

        storage.set(&ctx, "ok.txt", b"x").await.unwrap();
        storage.set(&ctx, "open.txt", b"x").await.unwrap();
        std::fs::set_permissions(dir.path().join("open.txt"), std::fs::Permissions::from_mode(0o644)).unwrap();
        std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

        let problems = storage.fsck(&ctx).await.unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].starts_with("open.txt"));
        assert!(!dir.path().join("empty").exists());
    }

    #[tokio::test]
    async fn test_loader_new_requires_directory() {
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let path = dir.path().join("missing");

        assert!(FsLoader.handles(&path).is_err());
        assert!(matches!(
            FsLoader.new(&ctx, &path).await,
            Err(StoreError::NotInitialized(_))
        ));
        let storage = FsLoader.init(&ctx, &path).await.unwrap();
        assert_eq!(storage.name(), "fs");
        assert!(FsLoader.handles(&path).is_ok());
    }
}
