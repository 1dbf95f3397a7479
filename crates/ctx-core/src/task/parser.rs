use super::args::{decode_value, Argument};
use super::lexer::{Lexer, Token, TokenKind};
use super::{Block, ParseError, SlashCommand, Task, Text};

/// Parse task text into alternating text and slash-command blocks.
///
/// A `/` opening a line always starts a command, and malformed commands
/// there are errors. A `/` that follows whitespace mid-line starts a command
/// only when the rest of the line parses as one; otherwise it stays text.
pub fn parse_task(input: &str) -> Result<Task, ParseError> {
    let tokens: Vec<Token<'_>> = Lexer::new(input).collect();
    let mut blocks = Vec::new();
    let mut text = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        let parsed = match token.kind {
            TokenKind::CmdStart => Some(parse_command(&tokens, i)?),
            TokenKind::Slash if follows_whitespace(&tokens, i) => parse_command(&tokens, i).ok(),
            _ => None,
        };

        match parsed {
            Some(mut parsed) => {
                if token.kind == TokenKind::Slash {
                    let end = tokens.get(parsed.next).map_or(input.len(), |t| t.offset)
                        - parsed.trailing.map_or(0, str::len);
                    parsed.command.inline = Some(input[token.offset..end].to_string());
                }
                flush_text(&mut blocks, &mut text);
                blocks.push(Block::SlashCommand(parsed.command));
                if let Some(rest) = parsed.trailing {
                    text.push(rest.to_string());
                }
                i = parsed.next;
            }
            None => {
                text.push(token.text.to_string());
                i += 1;
            }
        }
    }

    flush_text(&mut blocks, &mut text);
    Ok(Task { blocks })
}

struct ParsedCommand<'a> {
    command: SlashCommand,
    /// Line breaks after the one that terminated the command.
    trailing: Option<&'a str>,
    next: usize,
}

fn parse_command<'a>(tokens: &[Token<'a>], start: usize) -> Result<ParsedCommand<'a>, ParseError> {
    let slash = tokens[start];
    let name = match tokens.get(start + 1) {
        Some(t) if t.kind == TokenKind::Term => t.text,
        _ => {
            return Err(ParseError::MissingCommandName {
                offset: slash.offset,
            })
        }
    };

    let mut command = SlashCommand {
        name: name.to_string(),
        arguments: Vec::new(),
        inline: None,
    };
    let mut i = start + 2;

    loop {
        let Some(token) = tokens.get(i) else {
            return Ok(ParsedCommand {
                command,
                trailing: None,
                next: i,
            });
        };

        match token.kind {
            TokenKind::Newline => {
                let rest = &token.text[line_break_len(token.text)..];
                return Ok(ParsedCommand {
                    command,
                    trailing: (!rest.is_empty()).then_some(rest),
                    next: i + 1,
                });
            }
            TokenKind::Whitespace => {
                i += 1;
                match tokens.get(i).map(|t| t.kind) {
                    None | Some(TokenKind::Newline) => {}
                    Some(_) => {
                        let (argument, next) = parse_argument(tokens, i, &command.name)?;
                        command.arguments.push(argument);
                        i = next;
                    }
                }
            }
            _ => return Err(unexpected(&command.name, token)),
        }
    }
}

fn parse_argument(
    tokens: &[Token<'_>],
    i: usize,
    command: &str,
) -> Result<(Argument, usize), ParseError> {
    let token = tokens[i];
    let assign_follows = tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::Assign);

    match token.kind {
        TokenKind::Term if assign_follows => {
            let key = token.text.to_string();
            match tokens.get(i + 2) {
                Some(v) if matches!(v.kind, TokenKind::Term | TokenKind::Quoted) => {
                    Ok((Argument::named(key, decode_value(v.text)), i + 3))
                }
                Some(v) if v.kind == TokenKind::OpenQuote => {
                    Err(ParseError::UnclosedQuote { offset: v.offset })
                }
                None => Ok((Argument::named(key, String::new()), i + 2)),
                Some(v) if matches!(v.kind, TokenKind::Whitespace | TokenKind::Newline) => {
                    Ok((Argument::named(key, String::new()), i + 2))
                }
                Some(v) => Err(unexpected(command, v)),
            }
        }
        TokenKind::Term | TokenKind::Quoted => {
            Ok((Argument::positional(decode_value(token.text)), i + 1))
        }
        TokenKind::Assign => Err(ParseError::EmptyKey {
            offset: token.offset,
        }),
        TokenKind::OpenQuote => Err(ParseError::UnclosedQuote {
            offset: token.offset,
        }),
        _ => Err(unexpected(command, &token)),
    }
}

fn unexpected(command: &str, token: &Token<'_>) -> ParseError {
    ParseError::UnterminatedCommand {
        name: command.to_string(),
        found: token.text.to_string(),
        offset: token.offset,
    }
}

fn follows_whitespace(tokens: &[Token<'_>], i: usize) -> bool {
    i > 0 && tokens[i - 1].kind == TokenKind::Whitespace
}

fn line_break_len(newlines: &str) -> usize {
    if newlines.starts_with("\r\n") {
        2
    } else {
        1
    }
}

fn flush_text(blocks: &mut Vec<Block>, text: &mut Vec<String>) {
    if !text.is_empty() {
        blocks.push(Block::Text(Text {
            fragments: std::mem::take(text),
        }));
    }
}
