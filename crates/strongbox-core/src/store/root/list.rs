//! Namespace listing over all mounts

use tracing::warn;

use crate::error::StoreResult;
use crate::store::join;
use crate::tree::Root;
use crate::types::OpContext;

use super::RootStore;

/// Header line of rendered trees
pub const TREE_NAME: &str = "strongbox";

impl RootStore {
    /// Namespace tree over every mount
    ///
    /// Names shadowed by a more specific mount are hidden. A mount whose
    /// store cannot be opened still shows up, without entries.
    pub async fn tree(&self, ctx: &OpContext) -> StoreResult<Root> {
        let mut tree = Root::new(TREE_NAME);
        for alias in self.aliases() {
            if let Some(mount) = self.config.mounts.get(&alias) {
                tree.add_mount(&alias, mount.path.display().to_string());
            }

            let leaf = match self.leaf(ctx, &alias).await {
                Ok(leaf) => leaf,
                Err(e) => {
                    warn!(alias = %alias, error = %e, "cannot open store, skipping its entries");
                    continue;
                }
            };
            for name in leaf.list(ctx, "").await? {
                let full = join(&alias, &name);
                if self.resolve_mount(&full)?.0 == alias {
                    tree.add_file(&full);
                }
            }
        }
        Ok(tree)
    }

    /// Flat listing of every secret; see [`Root::list`] for `limit`
    pub async fn list(&self, ctx: &OpContext, limit: i64) -> StoreResult<Vec<String>> {
        Ok(self.tree(ctx).await?.list(limit))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{plain_ctx, root_with_work};
    use super::*;
    use crate::secrets::parse;
    use crate::tree::INF;

    #[tokio::test]
    async fn test_list_across_mounts() {
        let (_dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        for name in ["foo/bar", "foo/zen/baz/bar", "foo2/bar2", "work/db", "work/ci/token"] {
            root.set(&ctx, name, &parse(b"x")).await.unwrap();
        }

        assert_eq!(
            root.list(&ctx, INF).await.unwrap(),
            vec!["foo/bar", "foo/zen/baz/bar", "foo2/bar2", "work/ci/token", "work/db"]
        );
        assert_eq!(root.list(&ctx, 0).await.unwrap(), vec!["foo/", "foo2/", "work/"]);

        let tree = root.tree(&ctx).await.unwrap();
        assert_eq!(tree.list_folders(1), vec!["foo/", "foo/zen/", "foo2/", "work/", "work/ci/"]);
        assert_eq!(tree.len(), 5);
    }

    #[tokio::test]
    async fn test_tree_format_shows_mounts() {
        let (dir, root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "mail", &parse(b"x")).await.unwrap();
        root.set(&ctx, "work/db", &parse(b"x")).await.unwrap();

        let expected = format!(
            "strongbox\n├── mail\n└── work/ ({})\n    └── db\n",
            dir.path().join("work").display()
        );
        assert_eq!(root.tree(&ctx).await.unwrap().format(INF), expected);
    }

    #[tokio::test]
    async fn test_shadowed_entries_hidden() {
        let (dir, mut root) = root_with_work().await;
        let ctx = OpContext::new();
        root.set(&ctx, "work/team/db", &parse(b"x")).await.unwrap();
        root.add_mount(&plain_ctx(), "work/team", dir.path().join("team"), &["me".to_string()])
            .await
            .unwrap();
        root.set(&ctx, "work/team/other", &parse(b"x")).await.unwrap();

        // work's own team/db is unreachable behind the nested mount
        assert_eq!(root.list(&ctx, INF).await.unwrap(), vec!["work/team/other"]);
    }
}
