//! Single-pass placeholder expansion: `${name}`, `` !`cmd` `` and `@path`.
//!
//! The scan only ever reads the input text. Substituted text is copied
//! to the output and never looked at again, so parameter values, command
//! output and file contents cannot trigger further expansion.

use crate::params::Params;
use crate::process::ProcessRunner;
use std::path::Path;

pub struct Expander<'a> {
    params: &'a Params,
    runner: &'a dyn ProcessRunner,
    base_dir: &'a Path,
}

impl<'a> Expander<'a> {
    /// `base_dir` resolves relative `@path` references and is the working
    /// directory of `` !`cmd` `` expansions.
    pub fn new(params: &'a Params, runner: &'a dyn ProcessRunner, base_dir: &'a Path) -> Self {
        Self {
            params,
            runner,
            base_dir,
        }
    }

    /// Expand every placeholder in `content`.
    ///
    /// Command output is substituted exactly as produced, trailing newline
    /// included. Unbound parameters, failing commands and unreadable files
    /// are logged and never abort expansion.
    pub fn expand(&self, content: &str) -> String {
        let bytes = content.as_bytes();
        let mut out = String::with_capacity(content.len());
        let mut literal_start = 0;
        let mut i = 0;

        while i < bytes.len() {
            let replacement = match bytes[i] {
                b'$' => self.parameter(content, i),
                b'!' => self.command(content, i),
                b'@' if is_file_trigger(content, i) => self.file(content, i),
                _ => None,
            };
            match replacement {
                Some((text, end)) => {
                    out.push_str(&content[literal_start..i]);
                    out.push_str(&text);
                    literal_start = end;
                    i = end;
                }
                None => i += 1,
            }
        }

        out.push_str(&content[literal_start..]);
        out
    }

    fn parameter(&self, content: &str, start: usize) -> Option<(String, usize)> {
        let inner = content[start..].strip_prefix("${")?;
        let close = inner.find('}')?;
        let name = &inner[..close];
        if !is_identifier(name) {
            return None;
        }
        let end = start + 2 + close + 1;

        match self.params.get(name) {
            Some(value) => Some((value.to_string(), end)),
            None => {
                tracing::warn!(param = name, "parameter not bound, leaving placeholder");
                Some((content[start..end].to_string(), end))
            }
        }
    }

    fn command(&self, content: &str, start: usize) -> Option<(String, usize)> {
        let inner = content[start..].strip_prefix("!`")?;
        let close = inner.find('`')?;
        let command = &inner[..close];
        if command.trim().is_empty() {
            return None;
        }
        let end = start + 2 + close + 1;

        let result = self.runner.run_shell(command, self.base_dir);
        if !result.success {
            tracing::warn!(command, "command expansion failed");
        }
        Some((result.output, end))
    }

    fn file(&self, content: &str, start: usize) -> Option<(String, usize)> {
        let rest = &content[start + 1..];
        let raw = rest[..path_len(rest)].trim_end_matches(is_trailing_punctuation);
        if raw.is_empty() {
            return None;
        }
        let end = start + 1 + raw.len();
        let path = raw.replace("\\ ", " ");

        let full = Path::new(&path);
        let full = if full.is_absolute() {
            full.to_path_buf()
        } else {
            self.base_dir.join(full)
        };

        match std::fs::read_to_string(&full) {
            Ok(body) => Some((format_file(&path, &body), end)),
            Err(e) => {
                tracing::warn!(path = %full.display(), error = %e, "file reference not readable");
                Some((content[start..end].to_string(), end))
            }
        }
    }
}

/// A parameter name, or a positional index such as `1`.
fn is_identifier(name: &str) -> bool {
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `@` starts a file reference only at a word start and before a path-like
/// character, so `user@example.com` stays text.
fn is_file_trigger(content: &str, at: usize) -> bool {
    let before_ok = content[..at]
        .chars()
        .next_back()
        .map_or(true, |c| !is_identifier_char(c));
    let after_ok = content[at + 1..]
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '/' || c == '.');
    before_ok && after_ok
}

/// Byte length of the path following `@`. `\ ` escapes a space.
fn path_len(rest: &str) -> usize {
    let mut end = 0;
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        if c == '\\' && rest[idx + 1..].starts_with(' ') {
            chars.next();
            end = idx + 2;
            continue;
        }
        if c.is_whitespace() || matches!(c, '<' | '>' | '"' | '|' | '*' | '?' | '`') {
            break;
        }
        end = idx + c.len_utf8();
    }
    end
}

fn is_trailing_punctuation(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')')
}

fn format_file(path: &str, body: &str) -> String {
    let newline = if body.ends_with('\n') { "" } else { "\n" };
    format!("\n\nFile: {path}\n```\n{body}{newline}```\n\n")
}
