//! Tokenizer for the task language.
//!
//! The lexer is infallible: an unmatched quote becomes an [`TokenKind::OpenQuote`]
//! token and the parser decides whether that is an error (inside a command)
//! or literal text.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `/` as the first character of a line.
    CmdStart,
    /// `/` anywhere else.
    Slash,
    Assign,
    /// A complete `"..."` or `'...'` string, quotes included.
    Quoted,
    /// A quote character with no matching close quote on the same line.
    OpenQuote,
    Term,
    Whitespace,
    Newline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the token in the input.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            at_line_start: true,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.input[self.pos..];
        let first = rest.chars().next()?;

        let (kind, len) = match first {
            '/' if self.at_line_start => (TokenKind::CmdStart, 1),
            '/' => (TokenKind::Slash, 1),
            '=' => (TokenKind::Assign, 1),
            '"' | '\'' => match quoted_len(rest, first) {
                Some(len) => (TokenKind::Quoted, len),
                None => (TokenKind::OpenQuote, 1),
            },
            '\n' | '\r' => (TokenKind::Newline, run_len(rest, is_newline)),
            ' ' | '\t' => (TokenKind::Whitespace, run_len(rest, is_blank)),
            _ => (TokenKind::Term, run_len(rest, is_term_char)),
        };

        let token = Token {
            kind,
            text: &rest[..len],
            offset: self.pos,
        };
        self.pos += len;
        self.at_line_start = kind == TokenKind::Newline;
        Some(token)
    }
}

fn is_newline(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn is_term_char(c: char) -> bool {
    !matches!(c, ' ' | '\t' | '\n' | '\r' | '/' | '"' | '\'' | '=')
}

fn run_len(s: &str, pred: impl Fn(char) -> bool) -> usize {
    s.find(|c: char| !pred(c)).unwrap_or(s.len())
}

/// Byte length of the quoted string opening at `s[0]`, closing quote included.
/// Returns `None` when the line ends before a matching unescaped quote.
fn quoted_len(s: &str, quote: char) -> Option<usize> {
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                None | Some((_, '\n' | '\r')) => return None,
                Some(_) => {}
            },
            '\n' | '\r' => return None,
            c if c == quote => return Some(i + c.len_utf8()),
            _ => {}
        }
    }
    None
}
