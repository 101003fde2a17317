//! Git access: changed files in a commit range and file snapshots at a revision

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use git2::{Commit, ErrorCode, Repository};
use tracing::debug;

use crate::error::GitError;

/// Two revisions bounding a comparison, `A..B` or `A...B`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    pub base: String,
    pub head: String,
    /// Three-dot range: changes since the merge base of `base` and `head`
    pub symmetric: bool,
}

impl CommitRange {
    /// Parse a range. `...` is tried before `..`; an empty side means `HEAD`,
    /// and a bare revision means `<rev>..HEAD`.
    pub fn parse(range: &str) -> Result<Self, GitError> {
        let range = range.trim();
        if range.is_empty() {
            return Err(GitError::InvalidRange(range.to_string()));
        }

        let (base, head, symmetric) = if let Some((base, head)) = range.split_once("...") {
            (base, head, true)
        } else if let Some((base, head)) = range.split_once("..") {
            (base, head, false)
        } else {
            (range, "HEAD", false)
        };

        if base.is_empty() && head.is_empty() {
            return Err(GitError::InvalidRange(range.to_string()));
        }

        let or_head = |rev: &str| if rev.is_empty() { "HEAD".to_string() } else { rev.to_string() };
        Ok(Self {
            base: or_head(base),
            head: or_head(head),
            symmetric,
        })
    }

    /// `[before, after]` revision tokens
    pub fn revisions(&self) -> [&str; 2] {
        [&self.base, &self.head]
    }
}

impl FromStr for CommitRange {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.symmetric { "..." } else { ".." };
        write!(f, "{}{}{}", self.base, sep, self.head)
    }
}

/// Version-control queries used by the detectors
pub trait Vcs {
    /// Absolute paths of files changed in `range`
    fn changed_files(&self, range: &CommitRange) -> Result<Vec<PathBuf>, GitError>;

    /// File content at `revision`, or an empty string if it did not exist there
    fn file_at_revision(&self, path: &Path, revision: &str) -> String;
}

/// `Vcs` backed by a local git repository
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
}

impl GitRepository {
    /// Find the repository containing `path`
    pub fn discover(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let path = path.as_ref();
        let repo = Repository::discover(path).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotARepository(path.to_path_buf()),
            _ => GitError::Git(e),
        })?;

        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::NotARepository(path.to_path_buf()))?;
        let workdir = fs::canonicalize(workdir).unwrap_or_else(|_| workdir.to_path_buf());

        Ok(Self { repo, workdir })
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn commit(&self, range: &CommitRange, revision: &str) -> Result<Commit<'_>, GitError> {
        let object = self.repo.revparse_single(revision).map_err(|e| match e.code() {
            ErrorCode::NotFound | ErrorCode::Ambiguous | ErrorCode::InvalidSpec => {
                GitError::UnknownRevision {
                    range: range.to_string(),
                    revision: revision.to_string(),
                }
            }
            _ => GitError::Git(e),
        })?;
        Ok(object.peel_to_commit()?)
    }

    fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        if let Ok(rel) = path.strip_prefix(&self.workdir) {
            return Some(rel.to_path_buf());
        }
        // The file may be gone from the working tree, so canonicalize its directory
        let parent = fs::canonicalize(path.parent()?).ok()?;
        let rel = parent.strip_prefix(&self.workdir).ok()?;
        Some(rel.join(path.file_name()?))
    }

    fn read_blob(&self, rel: &Path, revision: &str) -> Result<String, git2::Error> {
        let tree = self.repo.revparse_single(revision)?.peel_to_tree()?;
        let entry = tree.get_path(rel)?;
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }
}

impl Vcs for GitRepository {
    fn changed_files(&self, range: &CommitRange) -> Result<Vec<PathBuf>, GitError> {
        let base = self.commit(range, &range.base)?;
        let head = self.commit(range, &range.head)?;

        let base_tree = if range.symmetric {
            let merge_base = self.repo.merge_base(base.id(), head.id())?;
            self.repo.find_commit(merge_base)?.tree()?
        } else {
            base.tree()?
        };
        let head_tree = head.tree()?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)?;

        let mut files: Vec<PathBuf> = Vec::new();
        for delta in diff.deltas() {
            let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                continue;
            };
            let absolute = self.workdir.join(path);
            if !files.contains(&absolute) {
                files.push(absolute);
            }
        }

        debug!("{} file(s) changed in {}", files.len(), range);
        Ok(files)
    }

    fn file_at_revision(&self, path: &Path, revision: &str) -> String {
        let Some(rel) = self.relative_path(path) else {
            debug!("{} is outside the repository", path.display());
            return String::new();
        };

        match self.read_blob(&rel, revision) {
            Ok(content) => content,
            Err(e) => {
                debug!("No snapshot of {} at {}: {}", rel.display(), revision, e.message());
                String::new()
            }
        }
    }
}
