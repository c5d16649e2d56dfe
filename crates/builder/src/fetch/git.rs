use crate::error::{BuilderErrorExt, Result};
use qobs_git::{CloneOptions, Git};
use std::path::Path;

/// A git source of the form `repo[@branch][#commit-or-tag]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitUrl {
    /// Repository URL, always ending in `.git`.
    pub url: String,
    pub branch: Option<String>,
    pub revision: Option<String>,
}

impl GitUrl {
    /// Splits off `#revision` and `@branch`.
    ///
    /// Only an `@` after the last `/` starts a branch, so `git@host:user/repo`
    /// keeps its user part.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (base, revision) = match raw.split_once('#') {
            Some((base, rev)) => (base, Some(rev.to_owned())),
            None => (raw, None),
        };

        let name_start = base.rfind('/').map_or(0, |i| i + 1);
        let (url, branch) = match base[name_start..].find('@') {
            Some(at) => {
                let at = name_start + at;
                (&base[..at], Some(base[at + 1..].to_owned()))
            },
            None => (base, None),
        };

        let mut url = url.to_owned();
        if !url.ends_with(".git") {
            url.push_str(".git");
        }

        Self {
            url,
            branch: branch.filter(|b| !b.is_empty()),
            revision: revision.filter(|r| !r.is_empty()),
        }
    }

    /// Without a pinned revision only the latest commit is needed.
    #[must_use]
    pub fn clone_options(&self) -> CloneOptions {
        CloneOptions {
            branch: self.branch.clone(),
            depth: self.revision.is_none().then_some(1),
            recurse_submodules: true,
        }
    }
}

/// Clones `raw` into `dest` and checks out its pinned revision, if any.
///
/// # Errors
/// Returns an error if git fails to clone or check out.
pub fn clone_repo(raw: &str, dest: &Path) -> Result<()> {
    let source = GitUrl::parse(raw);
    println!("  Cloning {}", source.url);

    let git = Git::new();
    git.clone_repo(&source.url, dest, &source.clone_options())
        .context(format!("Cloning {}", source.url))?;

    if let Some(revision) = &source.revision {
        git.checkout(dest, revision).context(format!("Checking out `{revision}`"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let url = GitUrl::parse("https://github.com/someone/something");
        assert_eq!(url.url, "https://github.com/someone/something.git");
        assert_eq!(url.branch, None);
        assert_eq!(url.revision, None);
        assert_eq!(url.clone_options().depth, Some(1));
    }

    #[test]
    fn test_parse_branch_and_revision() {
        let url = GitUrl::parse("https://github.com/someone/something@feature-branch#12345abc");
        assert_eq!(url.url, "https://github.com/someone/something.git");
        assert_eq!(url.branch.as_deref(), Some("feature-branch"));
        assert_eq!(url.revision.as_deref(), Some("12345abc"));

        let options = url.clone_options();
        assert_eq!(options.depth, None);
        assert_eq!(options.branch.as_deref(), Some("feature-branch"));
        assert!(options.recurse_submodules);
    }

    #[test]
    fn test_parse_revision_only() {
        let url = GitUrl::parse("https://codeberg.org/a/b.git#v0.1.0");
        assert_eq!(url.url, "https://codeberg.org/a/b.git");
        assert_eq!(url.branch, None);
        assert_eq!(url.revision.as_deref(), Some("v0.1.0"));
    }

    #[test]
    fn test_parse_keeps_ssh_user() {
        let url = GitUrl::parse("git@github.com:someone/something@main");
        assert_eq!(url.url, "git@github.com:someone/something.git");
        assert_eq!(url.branch.as_deref(), Some("main"));
    }
}
