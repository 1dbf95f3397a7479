use super::SlashCommand;
use crate::params::Params;
use std::borrow::Cow;
use std::fmt;

pub const ARGUMENTS_KEY: &str = "ARGUMENTS";

/// One slash-command argument. Positional when `key` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub key: Option<String>,
    pub value: String,
}

impl Argument {
    pub fn positional(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }

    pub fn named(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = &self.key {
            write!(f, "{key}=")?;
        }
        f.write_str(&quote_if_needed(&self.value))
    }
}

impl SlashCommand {
    /// Parameters seen by the command's template: `1..N` for every argument
    /// in source order (a named argument contributes its `key=value` form),
    /// each named key, and `ARGUMENTS` with all arguments joined by spaces.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for (i, argument) in self.arguments.iter().enumerate() {
            let position = (i + 1).to_string();
            match &argument.key {
                Some(key) => {
                    params.insert(position, argument.to_string());
                    params.insert(key.clone(), argument.value.clone());
                }
                None => params.insert(position, argument.value.clone()),
            }
        }
        let joined: Vec<String> = self.arguments.iter().map(|a| a.to_string()).collect();
        params.insert(ARGUMENTS_KEY, joined.join(" "));
        params
    }
}

/// Strip a matching pair of surrounding quotes and decode escapes inside.
/// Anything not wrapped in matching quotes is returned untouched.
pub fn decode_value(raw: &str) -> String {
    match strip_quotes(raw) {
        Some(inner) => decode_escapes(inner),
        None => raw.to_string(),
    }
}

fn strip_quotes(raw: &str) -> Option<&str> {
    let first = raw.chars().next()?;
    if raw.len() < 2 || !(first == '"' || first == '\'') || !raw.ends_with(first) {
        return None;
    }
    Some(&raw[1..raw.len() - 1])
}

/// Decode backslash escapes.
///
/// Incomplete `\u`/`\x` sequences are kept verbatim with their backslash; an
/// unknown escape keeps only the escaped character. Byte escapes (`\xHH`,
/// octal) are collected as raw bytes, so invalid UTF-8 comes out as U+FFFD.
pub fn decode_escapes(input: &str) -> String {
    if !input.contains('\\') {
        return input.to_string();
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let Some(&next) = bytes.get(i + 1) else {
            out.push(b'\\');
            break;
        };
        match next {
            b'n' | b't' | b'r' | b'\\' | b'"' | b'\'' => {
                out.push(match next {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    other => other,
                });
                i += 2;
            }
            b'u' => match hex_value(bytes, i + 2, 4).and_then(char::from_u32) {
                Some(c) => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    i += 6;
                }
                None => {
                    out.extend_from_slice(b"\\u");
                    i += 2;
                }
            },
            b'x' => match hex_value(bytes, i + 2, 2) {
                Some(v) => {
                    out.push(v as u8);
                    i += 4;
                }
                None => {
                    out.extend_from_slice(b"\\x");
                    i += 2;
                }
            },
            b'0'..=b'7' => {
                let (value, len) = octal_value(&bytes[i + 1..]);
                out.push(value);
                i += 1 + len;
            }
            // Drop the backslash; the escaped character is copied next round.
            _ => i += 1,
        }
    }

    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn hex_value(bytes: &[u8], start: usize, count: usize) -> Option<u32> {
    let digits = bytes.get(start..start + count)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let digits = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(digits, 16).ok()
}

/// Up to three octal digits, dropping the third if it would overflow a byte.
fn octal_value(bytes: &[u8]) -> (u8, usize) {
    let len = bytes
        .iter()
        .take(3)
        .take_while(|b| (b'0'..=b'7').contains(*b))
        .count();
    let parse = |n: usize| {
        bytes[..n]
            .iter()
            .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'))
    };
    let value = parse(len);
    if value > 255 {
        (parse(len - 1) as u8, len - 1)
    } else {
        (value as u8, len)
    }
}

fn quote_if_needed(value: &str) -> Cow<'_, str> {
    let plain = !value.is_empty()
        && !value.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '=' | '/' | '\\')
        });
    if plain {
        return Cow::Borrowed(value);
    }
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    Cow::Owned(quoted)
}
