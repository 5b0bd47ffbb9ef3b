//! In-tree reference rewriting.
//!
//! Walks a working tree and applies an ordered rule list to every text
//! file, then commits and pushes only when the tree is dirty. The two
//! default rules cover the SSH and HTTP(S) clone-URL shapes pointing at
//! the server domain; the shapes are mutually exclusive, so rule order
//! cannot re-match text an earlier rule produced.

use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::git::{CLOUD_REMOTE, run_git};

/// Commit message used for the single rewrite commit.
pub const REWRITE_COMMIT_MESSAGE: &str = "Update domain references";

/// One ordered pattern-substitution rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, &self.replacement).into_owned()
    }
}

/// The two clone-URL rewrite rules for a server domain / cloud workspace
/// pair. The trailing repository name survives via a named capture group.
pub fn default_rules(server_domain: &str, workspace: &str) -> Result<Vec<RewriteRule>> {
    let domain = regex::escape(server_domain);
    Ok(vec![
        RewriteRule::new(
            &format!(r"(?m)ssh://git@{domain}/(?:.*)/(?P<repository>.*\.git)"),
            &format!("git@bitbucket.org:{workspace}/${{repository}}"),
        )?,
        RewriteRule::new(
            &format!(r"(?m)https?://{domain}(?:.*)/(?P<repository>.*\.git)"),
            &format!("https://bitbucket.org/{workspace}/${{repository}}"),
        )?,
    ])
}

/// Apply every rule in order to every file under `root`, rewriting files
/// only when their content changed. Returns the changed paths.
///
/// Files that cannot be decoded as text, or that vanish mid-walk, are
/// skipped with a warning; the walk continues. The `.git` directory is
/// not part of the working tree and is left alone.
pub fn rewrite_tree(root: &Path, rules: &[RewriteRule]) -> Result<Vec<PathBuf>> {
    let mut changed = Vec::new();
    rewrite_dir(root, rules, &mut changed)?;
    Ok(changed)
}

fn rewrite_dir(dir: &Path, rules: &[RewriteRule], changed: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name() == ".git" {
                continue;
            }
            rewrite_dir(&path, rules, changed)?;
        } else {
            let original = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable file");
                    continue;
                }
            };
            let mut text = original.clone();
            for rule in rules {
                text = rule.apply(&text);
            }
            if text != original {
                std::fs::write(&path, &text)?;
                debug!(path = %path.display(), "rewrote references");
                changed.push(path);
            }
        }
    }
    Ok(())
}

/// Commit and push the tree if and only if it is dirty. Returns whether a
/// commit was made; a clean tree is the idempotent no-op of a re-run.
pub fn commit_and_push(repo: &Path, branch: &str, push: bool) -> Result<bool> {
    let status = run_git(&["status", "--porcelain"], Some(repo))?;
    let dirty = !String::from_utf8_lossy(&status.stdout).trim().is_empty();
    if !dirty {
        info!(repo = %repo.display(), "no changes to commit");
        return Ok(false);
    }

    for args in [
        vec!["add", "."],
        vec!["commit", "-m", REWRITE_COMMIT_MESSAGE],
    ] {
        let output = run_git(&args, Some(repo))?;
        if !output.status.success() {
            warn!(
                repo = %repo.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git {} failed", args[0]
            );
            return Ok(false);
        }
    }

    if push {
        let output = run_git(&["push", CLOUD_REMOTE, branch], Some(repo))?;
        if !output.status.success() {
            warn!(
                repo = %repo.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git push failed"
            );
        }
    }
    info!(repo = %repo.display(), "committed rewritten references");
    Ok(true)
}
