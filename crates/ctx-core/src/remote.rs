//! Extra search roots: local directories, `file://` URLs and remote sources
//! fetched into a temporary directory owned by a single run.

use crate::error::{CtxError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Retrieval of remote content. Everything network-facing sits behind this.
pub trait Fetcher {
    /// Materialize `source` as a directory at `dest` (which does not exist yet).
    fn fetch_dir(&self, source: &str, dest: &Path) -> Result<()>;

    /// Read a small text resource, such as a manifest.
    fn fetch_text(&self, source: &str) -> Result<String>;
}

/// `file://` URLs and plain paths are local; anything with `://` or a
/// `scheme::` prefix is remote.
pub fn is_local(source: &str) -> bool {
    source.starts_with("file://") || (!source.contains("://") && !source.contains("::"))
}

/// Resolve a local source against `base`.
pub fn local_path(source: &str, base: &Path) -> PathBuf {
    let path = Path::new(source.strip_prefix("file://").unwrap_or(source));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Non-empty, non-comment lines of a manifest.
pub fn parse_manifest(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Search roots
// ---------------------------------------------------------------------------

/// Resolved search roots. Fetched sources live in a private temporary
/// directory that is deleted when this value is dropped.
#[derive(Debug)]
pub struct SearchRoots {
    pub roots: Vec<PathBuf>,
    downloads: Option<TempDir>,
}

impl SearchRoots {
    pub fn resolve(sources: &[String], base: &Path, fetcher: &dyn Fetcher) -> Result<Self> {
        let mut roots = Vec::with_capacity(sources.len());
        let mut downloads: Option<TempDir> = None;

        for (i, source) in sources.iter().enumerate() {
            if is_local(source) {
                roots.push(local_path(source, base));
                continue;
            }
            let dir = match downloads.take() {
                Some(dir) => dir,
                None => tempfile::Builder::new()
                    .prefix("coding-context-")
                    .tempdir()?,
            };
            let dest = dir.path().join(format!("source-{i}"));
            downloads = Some(dir);
            fetcher.fetch_dir(source, &dest)?;
            tracing::info!(source = %source, dest = %dest.display(), "fetched search path");
            roots.push(dest);
        }

        Ok(Self { roots, downloads })
    }

    pub fn download_dir(&self) -> Option<&Path> {
        self.downloads.as_ref().map(TempDir::path)
    }
}

// ---------------------------------------------------------------------------
// System fetcher
// ---------------------------------------------------------------------------

/// Where a single file fetched over HTTP(S) lands inside its search root,
/// so the rule walk picks it up.
pub const FETCHED_RULES_DIR: &str = ".agents/rules";

/// Fetches git repositories with `git clone --depth 1` and single files over
/// HTTP(S). A single file becomes a rule of its own search root.
#[derive(Debug, Clone, Default)]
pub struct SystemFetcher;

impl Fetcher for SystemFetcher {
    fn fetch_dir(&self, source: &str, dest: &Path) -> Result<()> {
        if let Some(repo) = git_source(source) {
            return clone(source, repo, dest);
        }
        if is_http(source) {
            let body = self.fetch_text(source)?;
            let rules = dest.join(FETCHED_RULES_DIR);
            std::fs::create_dir_all(&rules)?;
            std::fs::write(rules.join(file_name(source)), body)?;
            return Ok(());
        }
        Err(CtxError::Fetch {
            url: source.to_string(),
            message: "unsupported source; use git::<url>, a .git URL or http(s)://".into(),
        })
    }

    fn fetch_text(&self, source: &str) -> Result<String> {
        if is_local(source) {
            let path = local_path(source, Path::new("."));
            return std::fs::read_to_string(&path).map_err(|source| CtxError::Read { path, source });
        }
        if !is_http(source) {
            return Err(CtxError::Fetch {
                url: source.to_string(),
                message: "only http(s) URLs can be read directly".into(),
            });
        }
        let response = reqwest::blocking::get(source)?.error_for_status()?;
        Ok(response.text()?)
    }
}

fn is_http(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// The clone URL for git sources: `git::` prefixed, `git@host:` or `*.git`.
fn git_source(source: &str) -> Option<&str> {
    if let Some(rest) = source.strip_prefix("git::") {
        return Some(rest);
    }
    let bare = source.split_once("?ref=").map_or(source, |(url, _)| url);
    (source.starts_with("git@") || bare.ends_with(".git")).then_some(source)
}

fn clone(source: &str, repo: &str, dest: &Path) -> Result<()> {
    let fail = |message: String| CtxError::Fetch {
        url: source.to_string(),
        message,
    };
    let git = which::which("git").map_err(|e| fail(format!("git not found: {e}")))?;

    let (url, reference) = match repo.split_once("?ref=") {
        Some((url, reference)) => (url, Some(reference)),
        None => (repo, None),
    };

    let mut command = Command::new(git);
    command.args(["clone", "--quiet", "--depth", "1"]);
    if let Some(reference) = reference {
        command.args(["--branch", reference]);
    }
    let output = command.arg(url).arg(dest).output()?;
    if !output.status.success() {
        return Err(fail(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    Ok(())
}

/// Last path segment of a URL, ignoring any query string.
fn file_name(url: &str) -> &str {
    let path = url.split(|c| c == '?' || c == '#').next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() && !name.contains(':') => name,
        _ => "index.md",
    }
}
