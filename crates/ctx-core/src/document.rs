use crate::agent::Agent;
use crate::error::{CtxError, Result};
use crate::frontmatter::{self, FrontMatter};
use crate::skills::Skill;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Rough token estimate: four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// A markdown file split into frontmatter and content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub path: PathBuf,
    pub frontmatter: FrontMatter,
    pub content: String,
    pub tokens: usize,
}

impl Document {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CtxError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let invalid = |message: String| CtxError::Frontmatter {
            path: path.to_path_buf(),
            message,
        };
        let (yaml, content) = frontmatter::split(text).map_err(invalid)?;
        let frontmatter = match yaml {
            Some(yaml) => FrontMatter::parse(yaml).map_err(invalid)?,
            None => FrontMatter::default(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            frontmatter,
            content: content.to_string(),
            tokens: estimate_tokens(content),
        })
    }

    /// Replace the content, keeping the token estimate in step.
    pub fn set_content(&mut self, content: String) {
        self.tokens = estimate_tokens(&content);
        self.content = content;
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// Everything assembled for one task.
#[derive(Debug, Clone, Serialize)]
pub struct ContextResult {
    pub agent: Option<Agent>,
    pub rules: Vec<Document>,
    pub skills: Vec<Skill>,
    pub task: Document,
    pub tokens: usize,
    pub prompt: String,
}
