use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A frontmatter value. Selector matching only ever sees [`render`](Self::render).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FrontMatterValue {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
    List(Vec<FrontMatterValue>),
    Map(BTreeMap<String, FrontMatterValue>),
}

impl FrontMatterValue {
    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn from_yaml(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from_yaml).collect()),
            Value::Mapping(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (Self::from_yaml(k).render(), Self::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }
}

/// Scalars render bare; lists as `[a b]`; maps as `{k: v}`.
impl fmt::Display for FrontMatterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FrontMatter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrontMatter(BTreeMap<String, FrontMatterValue>);

impl FrontMatter {
    /// Parse a YAML frontmatter body. An empty body is an empty mapping.
    pub fn parse(yaml: &str) -> Result<Self, String> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        match FrontMatterValue::from_yaml(value) {
            FrontMatterValue::Null => Ok(Self::default()),
            FrontMatterValue::Map(map) => Ok(Self(map)),
            other => Err(format!("expected a mapping, found '{other}'")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FrontMatterValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FrontMatterValue::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FrontMatterValue) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `${}`, `` !`cmd` `` and `@path` expansion applies. Defaults to on.
    pub fn expand(&self) -> bool {
        self.get("expand")
            .and_then(FrontMatterValue::as_bool)
            .unwrap_or(true)
    }

    /// The `selectors:` mapping of a task or command.
    pub fn selectors(&self) -> Option<&BTreeMap<String, FrontMatterValue>> {
        match self.get("selectors") {
            Some(FrontMatterValue::Map(map)) => Some(map),
            _ => None,
        }
    }

    pub fn agent(&self) -> Option<&str> {
        self.get_str("agent").filter(|s| !s.trim().is_empty())
    }

    /// Inline bootstrap script of a rule.
    pub fn bootstrap(&self) -> Option<&str> {
        self.get_str("bootstrap").filter(|s| !s.trim().is_empty())
    }
}

impl FromIterator<(String, FrontMatterValue)> for FrontMatter {
    fn from_iter<T: IntoIterator<Item = (String, FrontMatterValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Split a document into its frontmatter body and content.
///
/// Frontmatter exists only when the first line is exactly `---`; it runs to
/// the next line that is exactly `---`. Content is everything after that
/// line, verbatim. Returns `Err` when the closing delimiter is missing.
pub fn split(text: &str) -> Result<(Option<&str>, &str), String> {
    let Some(body_start) = delimiter_line_end(text, 0) else {
        return Ok((None, text));
    };

    let mut line_start = body_start;
    while line_start < text.len() {
        if let Some(content_start) = delimiter_line_end(text, line_start) {
            return Ok((Some(&text[body_start..line_start]), &text[content_start..]));
        }
        line_start = match text[line_start..].find('\n') {
            Some(i) => line_start + i + 1,
            None => text.len(),
        };
    }
    Err("unterminated frontmatter: missing closing '---'".to_string())
}

/// If the line starting at `start` is exactly `---`, the offset just past it.
fn delimiter_line_end(text: &str, start: usize) -> Option<usize> {
    let rest = &text[start..];
    let (line, len) = match rest.find('\n') {
        Some(i) => (&rest[..i], i + 1),
        None => (rest, rest.len()),
    };
    (line.strip_suffix('\r').unwrap_or(line) == "---").then_some(start + len)
}
