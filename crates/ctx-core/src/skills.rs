use crate::document::Document;
use crate::error::{CtxError, Result};
use crate::frontmatter::FrontMatter;
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::OnceLock;

pub const SKILL_FILE: &str = "SKILL.md";

const MAX_NAME: usize = 64;
const MAX_DESCRIPTION: usize = 1024;
const MAX_COMPATIBILITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,
    /// Path of the skill's `SKILL.md`.
    pub path: PathBuf,
    pub frontmatter: FrontMatter,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap())
}

impl Skill {
    /// Validate a parsed `SKILL.md`. The `name` must equal its directory name.
    pub fn from_document(doc: Document) -> Result<Self> {
        let invalid = |reason: String| CtxError::InvalidSkill {
            path: doc.path.clone(),
            reason,
        };

        let name = doc.frontmatter.get_str("name").unwrap_or_default().trim();
        if name.is_empty() || name.len() > MAX_NAME || !name_re().is_match(name) {
            return Err(invalid(format!(
                "name '{name}' must be 1-{MAX_NAME} lowercase letters, digits or single hyphens"
            )));
        }
        let dir_name = doc
            .path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name != dir_name {
            return Err(invalid(format!(
                "name '{name}' does not match directory '{dir_name}'"
            )));
        }

        let description = doc.frontmatter.get_str("description").unwrap_or_default().trim();
        if description.is_empty() || description.chars().count() > MAX_DESCRIPTION {
            return Err(invalid(format!(
                "description must be 1-{MAX_DESCRIPTION} characters"
            )));
        }

        let compatibility = doc
            .frontmatter
            .get_str("compatibility")
            .map(str::trim)
            .filter(|c| !c.is_empty());
        if compatibility.is_some_and(|c| c.chars().count() > MAX_COMPATIBILITY) {
            return Err(invalid(format!(
                "compatibility must be at most {MAX_COMPATIBILITY} characters"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            compatibility: compatibility.map(str::to_string),
            path: doc.path.clone(),
            frontmatter: doc.frontmatter.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Prompt rendering
// ---------------------------------------------------------------------------

/// The `<available_skills>` block listed in the prompt. Empty for no skills.
pub fn render_skills(skills: &[Skill]) -> String {
    if skills.is_empty() {
        return String::new();
    }
    let mut out = String::from("<available_skills>\n");
    for skill in skills {
        out.push_str("  <skill>\n");
        let _ = writeln!(out, "    <name>{}</name>", escape_xml(&skill.name));
        let _ = writeln!(
            out,
            "    <description>{}</description>",
            escape_xml(&skill.description)
        );
        let _ = writeln!(
            out,
            "    <location>{}</location>",
            escape_xml(&skill.path.display().to_string())
        );
        out.push_str("  </skill>\n");
    }
    out.push_str("</available_skills>");
    out
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn skill_doc(dir: &str, frontmatter: &str) -> Document {
        let path = Path::new("/skills").join(dir).join(SKILL_FILE);
        Document::parse(&path, &format!("---\n{frontmatter}---\nBody\n")).unwrap()
    }

    #[test]
    fn valid_skill() {
        let doc = skill_doc(
            "pdf-tools",
            "name: pdf-tools\ndescription: Work with PDFs\ncompatibility: needs poppler\n",
        );
        let skill = Skill::from_document(doc).unwrap();
        assert_eq!(skill.name, "pdf-tools");
        assert_eq!(skill.description, "Work with PDFs");
        assert_eq!(skill.compatibility.as_deref(), Some("needs poppler"));
    }

    #[test]
    fn invalid_names() {
        let too_long = "a".repeat(65);
        for name in ["", "Upper", "-lead", "trail-", "dou--ble", "under_score", too_long.as_str()] {
            let doc = skill_doc(name, &format!("name: \"{name}\"\ndescription: d\n"));
            assert!(Skill::from_document(doc).is_err(), "expected invalid: {name:?}");
        }
    }

    #[test]
    fn name_must_match_directory() {
        let doc = skill_doc("other", "name: pdf\ndescription: d\n");
        let err = Skill::from_document(doc).unwrap_err();
        assert!(err.to_string().contains("does not match"), "{err}");
    }

    #[test]
    fn description_limits() {
        let doc = skill_doc("a", "name: a\n");
        assert!(Skill::from_document(doc).is_err());
        let long = "x".repeat(1025);
        let doc = skill_doc("a", &format!("name: a\ndescription: {long}\n"));
        assert!(Skill::from_document(doc).is_err());
        let max = "x".repeat(1024);
        let doc = skill_doc("a", &format!("name: a\ndescription: {max}\n"));
        assert!(Skill::from_document(doc).is_ok());
    }

    #[test]
    fn compatibility_limit() {
        let long = "c".repeat(501);
        let doc = skill_doc("a", &format!("name: a\ndescription: d\ncompatibility: {long}\n"));
        assert!(Skill::from_document(doc).is_err());
    }

    #[test]
    fn render_escapes_markup() {
        let doc = skill_doc("a", "name: a\ndescription: \"Use <b> & 'quotes'\"\n");
        let skill = Skill::from_document(doc).unwrap();
        let xml = render_skills(&[skill]);
        assert!(xml.starts_with("<available_skills>\n  <skill>\n    <name>a</name>\n"));
        assert!(xml.contains("<description>Use &lt;b&gt; &amp; &apos;quotes&apos;</description>"));
        assert!(xml.contains("<location>/skills/a/SKILL.md</location>"));
        assert!(xml.ends_with("</available_skills>"));
    }

    #[test]
    fn render_nothing_for_no_skills() {
        assert_eq!(render_skills(&[]), "");
    }
}
