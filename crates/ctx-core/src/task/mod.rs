//! The task language: free text interleaved with slash commands.

mod args;
pub mod lexer;
mod parser;

pub use args::{decode_escapes, decode_value, Argument, ARGUMENTS_KEY};
pub use parser::parse_task;

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unclosed quote at offset {offset}")]
    UnclosedQuote { offset: usize },

    #[error("missing command name after '/' at offset {offset}")]
    MissingCommandName { offset: usize },

    #[error("command /{name} must be followed by a newline, found {found:?} at offset {offset}")]
    UnterminatedCommand {
        name: String,
        found: String,
        offset: usize,
    },

    #[error("empty argument key at offset {offset}")]
    EmptyKey { offset: usize },
}

/// A parsed task template. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(Text),
    SlashCommand(SlashCommand),
}

/// Literal text, kept as the token slices it was lexed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub fragments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: String,
    pub arguments: Vec<Argument>,
    /// Verbatim source, line break included, of a command found mid-line.
    /// `None` for commands opening a line.
    pub inline: Option<String>,
}

impl Task {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        parse_task(input)
    }

    pub fn commands(&self) -> impl Iterator<Item = &SlashCommand> {
        self.blocks.iter().filter_map(|block| match block {
            Block::SlashCommand(command) => Some(command),
            Block::Text(_) => None,
        })
    }
}

impl Text {
    pub fn content(&self) -> String {
        self.fragments.concat()
    }
}

impl SlashCommand {
    /// The `n`th argument in source order, 1-based, named or not.
    pub fn argument(&self, n: usize) -> Option<&Argument> {
        n.checked_sub(1).and_then(|i| self.arguments.get(i))
    }
}

impl fmt::Display for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        for argument in &self.arguments {
            write!(f, " {argument}")?;
        }
        Ok(())
    }
}

/// Text blocks are written back verbatim; commands in canonical form, each
/// followed by a newline unless it is the final block.
impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            match block {
                Block::Text(text) => {
                    for fragment in &text.fragments {
                        f.write_str(fragment)?;
                    }
                }
                Block::SlashCommand(command) => {
                    write!(f, "{command}")?;
                    if i + 1 < self.blocks.len() {
                        f.write_str("\n")?;
                    }
                }
            }
        }
        Ok(())
    }
}
