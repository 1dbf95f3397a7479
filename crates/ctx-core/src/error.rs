use crate::task::ParseError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtxError {
    #[error("unknown agent '{name}': expected one of {expected}")]
    UnknownAgent { name: String, expected: String },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("command not found: /{0}")]
    CommandNotFound(String),

    #[error("duplicate {kind} '{name}': {} and {}", first.display(), second.display())]
    Duplicate {
        kind: &'static str,
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid task {}: {error}", path.display())]
    TaskParse { path: PathBuf, error: ParseError },

    #[error("bootstrap for {} failed: {output}", path.display())]
    BootstrapFailed { path: PathBuf, output: String },

    #[error("invalid frontmatter in {}: {message}", path.display())]
    Frontmatter { path: PathBuf, message: String },

    #[error("invalid skill {}: {reason}", path.display())]
    InvalidSkill { path: PathBuf, reason: String },

    #[error("invalid selector '{0}': expected key=value")]
    InvalidSelector(String),

    #[error("invalid parameter '{0}': expected key=value")]
    InvalidParam(String),

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, CtxError>;
