//! Directory tree storage versioned with the git CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::command;
use crate::backend::{Revision, Storage, StorageLoader};
use crate::error::{StoreError, StoreResult};
use crate::types::OpContext;

use super::fs::FsStorage;

pub const NAME: &str = "gitfs";

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const LOG_FORMAT: &str = "--format=%H%x1f%an%x1f%ae%x1f%at%x1f%s%x1f%b%x1e";

/// [`FsStorage`] plus a git repository at the same root
#[derive(Debug, Clone)]
pub struct GitStorage {
    fs: FsStorage,
    binary: String,
}

impl GitStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            fs: FsStorage::new(path),
            binary: "git".to_string(),
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(self.fs.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C");
        cmd
    }

    async fn git_run(&self, ctx: &OpContext, args: &[&str]) -> StoreResult<Vec<u8>> {
        let mut cmd = self.git();
        cmd.args(args);
        command::run(ctx, cmd, None).await
    }

    /// Create the directory, the repository and a local identity
    async fn create(&self, ctx: &OpContext) -> StoreResult<()> {
        self.fs.create().await?;
        if !self.fs.path().join(".git").exists() {
            self.git_run(ctx, &["init", "--quiet"]).await?;
        }

        // commits must work on machines without a global git identity
        for (key, fallback) in [("user.name", "strongbox"), ("user.email", "strongbox@localhost")] {
            let mut cmd = self.git();
            cmd.args(["config", "--get", key]);
            let out = command::output(ctx, cmd, None).await?;
            if !out.status.success() || out.stdout.iter().all(u8::is_ascii_whitespace) {
                self.git_run(ctx, &["config", "--local", key, fallback]).await?;
            }
        }
        self.git_run(ctx, &["config", "--local", "commit.gpgsign", "false"]).await?;
        Ok(())
    }

    async fn has_remote(&self, ctx: &OpContext, remote: &str) -> StoreResult<bool> {
        let out = self.git_run(ctx, &["remote"]).await?;
        Ok(String::from_utf8_lossy(&out).lines().any(|l| l.trim() == remote))
    }
}

/// A ref or hash git cannot mistake for a command-line option
fn is_plain_ref(value: &str) -> bool {
    !value.is_empty() && !value.starts_with('-')
}

fn parse_log(raw: &str) -> Vec<Revision> {
    raw.split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let fields: Vec<&str> = record.splitn(6, FIELD_SEP).collect();
            if fields.len() < 6 {
                return None;
            }
            let secs = fields[3].trim().parse::<i64>().ok()?;
            let date = Utc.timestamp_opt(secs, 0).single()?;
            Some(Revision {
                hash: fields[0].trim().to_string(),
                author_name: fields[1].to_string(),
                author_email: fields[2].to_string(),
                date,
                subject: fields[4].to_string(),
                body: fields[5].trim_end().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl Storage for GitStorage {
    fn name(&self) -> &str {
        NAME
    }

    fn path(&self) -> &Path {
        self.fs.path()
    }

    fn exists(&self, name: &str) -> bool {
        self.fs.exists(name)
    }

    fn is_dir(&self, name: &str) -> bool {
        self.fs.is_dir(name)
    }

    async fn get(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<u8>> {
        self.fs.get(ctx, name).await
    }

    async fn set(&self, ctx: &OpContext, name: &str, value: &[u8]) -> StoreResult<()> {
        self.fs.set(ctx, name, value).await
    }

    async fn delete(&self, ctx: &OpContext, name: &str) -> StoreResult<()> {
        self.fs.delete(ctx, name).await
    }

    async fn list(&self, ctx: &OpContext, prefix: &str) -> StoreResult<Vec<String>> {
        self.fs.list(ctx, prefix).await
    }

    async fn prune(&self, ctx: &OpContext, prefix: &str) -> StoreResult<()> {
        self.fs.prune(ctx, prefix).await
    }

    async fn fsck(&self, ctx: &OpContext) -> StoreResult<Vec<String>> {
        let mut problems = self.fs.fsck(ctx).await?;
        let status = self.status(ctx).await?;
        if !status.trim().is_empty() {
            problems.push(format!("uncommitted changes:\n{}", status.trim_end()));
        }
        Ok(problems)
    }

    fn is_versioned(&self) -> bool {
        true
    }

    async fn add(&self, ctx: &OpContext, files: &[String]) -> StoreResult<()> {
        let mut cmd = self.git();
        cmd.args(["add", "--all", "--"]).args(files);
        command::run(ctx, cmd, None).await?;
        Ok(())
    }

    async fn commit(&self, ctx: &OpContext, message: &str) -> StoreResult<()> {
        let mut cmd = self.git();
        cmd.args(["commit", "--quiet", "-m", message]);
        let out = command::output(ctx, cmd, None).await?;
        if out.status.success() {
            debug!(path = %self.path().display(), "committed");
            return Ok(());
        }
        let stdout = String::from_utf8_lossy(&out.stdout);
        if stdout.contains("nothing to commit") || stdout.contains("nothing added to commit") {
            debug!(path = %self.path().display(), "nothing to commit");
            return Ok(());
        }
        command::check("git", out).map(|_| ())
    }

    async fn revisions(&self, ctx: &OpContext, name: &str) -> StoreResult<Vec<Revision>> {
        let out = self
            .git_run(ctx, &["log", LOG_FORMAT, "--", name])
            .await?;
        let revisions = parse_log(&String::from_utf8_lossy(&out));
        if revisions.is_empty() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(revisions)
    }

    async fn get_revision(&self, ctx: &OpContext, name: &str, revision: &str) -> StoreResult<Vec<u8>> {
        let spec = format!("{}:{}", revision, name);
        if !is_plain_ref(revision) {
            debug!(revision = %revision, "refusing revision that git would read as an option");
            return Err(StoreError::NotFound(spec));
        }
        let mut cmd = self.git();
        cmd.args(["show", &spec]);
        let out = command::output(ctx, cmd, None).await?;
        if out.status.success() {
            return Ok(out.stdout);
        }
        debug!(entry = %name, revision = %revision, "revision lookup failed");
        Err(StoreError::NotFound(spec))
    }

    async fn status(&self, ctx: &OpContext) -> StoreResult<String> {
        let out = self.git_run(ctx, &["status", "--porcelain"]).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn push(&self, ctx: &OpContext, remote: &str, branch: &str) -> StoreResult<()> {
        if !is_plain_ref(branch) {
            return Err(StoreError::InvalidName(branch.to_string()));
        }
        if !self.has_remote(ctx, remote).await? {
            debug!(remote = %remote, "no such remote, skipping push");
            return Ok(());
        }
        self.git_run(ctx, &["push", remote, branch]).await?;
        info!(remote = %remote, branch = %branch, path = %self.path().display(), "pushed");
        Ok(())
    }

    async fn pull(&self, ctx: &OpContext, remote: &str, branch: &str) -> StoreResult<()> {
        if !is_plain_ref(branch) {
            return Err(StoreError::InvalidName(branch.to_string()));
        }
        if !self.has_remote(ctx, remote).await? {
            debug!(remote = %remote, "no such remote, skipping pull");
            return Ok(());
        }
        self.git_run(ctx, &["pull", "--ff-only", remote, branch]).await?;
        info!(remote = %remote, branch = %branch, path = %self.path().display(), "pulled");
        Ok(())
    }
}

/// Loader for [`GitStorage`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GitLoader;

#[async_trait]
impl StorageLoader for GitLoader {
    fn name(&self) -> &str {
        NAME
    }

    fn priority(&self) -> i32 {
        10
    }

    fn handles(&self, path: &Path) -> StoreResult<()> {
        let marker = path.join(".git");
        if marker.exists() {
            Ok(())
        } else {
            Err(StoreError::BackendNotDetected(marker))
        }
    }

    async fn new(&self, _ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        self.handles(path)
            .map_err(|_| StoreError::NotInitialized(path.to_path_buf()))?;
        Ok(Arc::new(GitStorage::new(path)))
    }

    async fn init(&self, ctx: &OpContext, path: &Path) -> StoreResult<Arc<dyn Storage>> {
        let storage = GitStorage::new(path);
        storage.create(ctx).await?;
        info!(path = %path.display(), "initialized git storage");
        Ok(Arc::new(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_parse_log() {
        let raw = "abc\u{1f}Jo\u{1f}jo@example.com\u{1f}1700000000\u{1f}second\u{1f}details\n\u{1e}\n\
                   def\u{1f}Jo\u{1f}jo@example.com\u{1f}1690000000\u{1f}first\u{1f}\u{1e}\n";
        let revs = parse_log(raw);
        assert_eq!(revs.len(), 2);
        assert_eq!(revs[0].hash, "abc");
        assert_eq!(revs[0].subject, "second");
        assert_eq!(revs[0].body, "details");
        assert_eq!(revs[0].date.timestamp(), 1_700_000_000);
        assert_eq!(revs[1].author_email, "jo@example.com");
        assert_eq!(revs[1].body, "");
    }

    #[tokio::test]
    async fn test_commit_and_revisions() {
        if !git_available() {
            eprintln!("git not available, skipping");
            return;
        }
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = GitLoader.init(&ctx, dir.path()).await.unwrap();
        assert!(storage.is_versioned());
        assert!(GitLoader.handles(dir.path()).is_ok());

        let name = "web/site.txt".to_string();
        storage.set(&ctx, &name, b"v1").await.unwrap();
        storage.add(&ctx, &[name.clone()]).await.unwrap();
        storage.commit(&ctx, "add site").await.unwrap();
        storage.set(&ctx, &name, b"v2").await.unwrap();
        storage.add(&ctx, &[name.clone()]).await.unwrap();
        storage.commit(&ctx, "update site").await.unwrap();
        // no changes staged
        storage.commit(&ctx, "noop").await.unwrap();

        let revs = storage.revisions(&ctx, &name).await.unwrap();
        assert_eq!(revs.len(), 2);
        assert_eq!(revs[0].subject, "update site");
        assert_eq!(storage.get_revision(&ctx, &name, &revs[1].hash).await.unwrap(), b"v1");
        assert_eq!(storage.get_revision(&ctx, &name, &revs[0].hash).await.unwrap(), b"v2");
        assert!(storage.status(&ctx).await.unwrap().trim().is_empty());
        assert!(storage.fsck(&ctx).await.unwrap().is_empty());

        // no remote configured
        storage.push(&ctx, "origin", "main").await.unwrap();
    }

    #[tokio::test]
    async fn test_revisions_of_unknown_entry() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = GitLoader.init(&ctx, dir.path()).await.unwrap();
        storage.set(&ctx, "a.txt", b"x").await.unwrap();
        storage.add(&ctx, &["a.txt".to_string()]).await.unwrap();
        storage.commit(&ctx, "a").await.unwrap();

        assert!(storage.revisions(&ctx, "b.txt").await.unwrap_err().is_not_found());
        assert!(storage.get_revision(&ctx, "a.txt", "nosuchrev").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_option_like_revision_rejected() {
        if !git_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let ctx = OpContext::new();
        let storage = GitLoader.init(&ctx, &dir.path().join("store")).await.unwrap();
        storage.set(&ctx, "db.txt", b"x").await.unwrap();
        storage.add(&ctx, &["db.txt".to_string()]).await.unwrap();
        storage.commit(&ctx, "add db").await.unwrap();

        let out = dir.path().join("leaked");
        let revision = format!("--output={}", out.display());
        assert!(storage.get_revision(&ctx, "db.txt", &revision).await.unwrap_err().is_not_found());
        assert!(storage.get_revision(&ctx, "db.txt", "").await.unwrap_err().is_not_found());
        assert!(!dir.path().join("leaked:db.txt").exists());
        assert!(!out.exists());

        assert!(matches!(
            storage.push(&ctx, "origin", "--force").await,
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_is_plain_ref() {
        assert!(is_plain_ref("HEAD"));
        assert!(is_plain_ref("a1b2c3"));
        assert!(!is_plain_ref(""));
        assert!(!is_plain_ref("--output=/tmp/x"));
    }
}
