use crate::error::{CtxError, Result};
use crate::frontmatter::{FrontMatter, FrontMatterValue};
use crate::params::parse_assignment;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Include constraints: values under one key are OR'd, keys are AND'd.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selectors(BTreeMap<String, BTreeSet<String>>);

impl Selectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from repeated `key=value` assignments.
    pub fn from_assignments<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selectors = Self::new();
        for item in items {
            selectors.set(item.as_ref())?;
        }
        Ok(selectors)
    }

    /// Add one `key=value` assignment; key and value are trimmed.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = parse_assignment(assignment)
            .ok_or_else(|| CtxError::InvalidSelector(assignment.to_string()))?;
        self.insert(key, value.trim());
        Ok(())
    }

    /// Accumulate `value` under `key`. Values are never replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().insert(value.into());
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.0.get(key).is_some_and(|values| values.contains(value))
    }

    /// Merge a `selectors:` frontmatter mapping. List values add every element.
    pub fn merge(&mut self, selectors: &BTreeMap<String, FrontMatterValue>) {
        for (key, value) in selectors {
            match value {
                FrontMatterValue::List(items) => {
                    for item in items {
                        self.insert(key.clone(), item.render());
                    }
                }
                other => self.insert(key.clone(), other.render()),
            }
        }
    }

    /// Whether `frontmatter` satisfies every constraint.
    ///
    /// A key missing from the frontmatter never excludes. A list value
    /// matches when it is empty or any element is accepted.
    pub fn matches(&self, frontmatter: &FrontMatter) -> bool {
        self.0.iter().all(|(key, accepted)| match frontmatter.get(key) {
            None => true,
            Some(FrontMatterValue::List(items)) => {
                items.is_empty() || items.iter().any(|item| accepted.contains(&item.render()))
            }
            Some(value) => accepted.contains(&value.render()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fm(yaml: &str) -> FrontMatter {
        FrontMatter::parse(yaml).unwrap()
    }

    #[test]
    fn mismatched_value_excludes_and_missing_key_includes() {
        let selectors = Selectors::from_assignments(["env=development"]).unwrap();
        assert!(!selectors.matches(&fm("env: production")));
        assert!(selectors.matches(&fm("")));
        assert!(selectors.matches(&fm("other: thing")));
    }

    #[test]
    fn values_under_one_key_are_alternatives() {
        let selectors = Selectors::from_assignments(["env=dev", "env=prod"]).unwrap();
        assert!(selectors.matches(&fm("env: dev")));
        assert!(selectors.matches(&fm("env: prod")));
        assert!(!selectors.matches(&fm("env: test")));
    }

    #[test]
    fn distinct_keys_must_all_match() {
        let selectors = Selectors::from_assignments(["env=prod", "lang=rust"]).unwrap();
        assert!(selectors.matches(&fm("env: prod\nlang: rust")));
        assert!(!selectors.matches(&fm("env: prod\nlang: go")));
        assert!(selectors.matches(&fm("env: prod")));
    }

    #[test]
    fn non_string_values_compare_as_rendered_text() {
        let selectors = Selectors::from_assignments(["version=2", "enabled=true"]).unwrap();
        assert!(selectors.matches(&fm("version: 2\nenabled: true")));
        assert!(!selectors.matches(&fm("version: 3")));
        assert!(!selectors.matches(&fm("enabled: false")));
    }

    #[test]
    fn list_values_match_any_element() {
        let selectors = Selectors::from_assignments(["lang=rust"]).unwrap();
        assert!(selectors.matches(&fm("lang: [go, rust]")));
        assert!(!selectors.matches(&fm("lang: [go, python]")));
        assert!(selectors.matches(&fm("lang: []")));
    }

    #[test]
    fn empty_selectors_match_everything() {
        assert!(Selectors::new().matches(&fm("env: anything")));
    }

    #[test]
    fn no_shared_keys_is_always_permissive() {
        let selectors = Selectors::from_assignments(["a=1", "b=2", "c=3"]).unwrap();
        for yaml in ["", "x: 1", "y: [1, 2]", "z: {k: v}", "w: null"] {
            assert!(selectors.matches(&fm(yaml)), "{yaml}");
        }
    }

    #[test]
    fn empty_value_is_kept_and_later_values_accumulate() {
        let mut selectors = Selectors::from_assignments(["env="]).unwrap();
        assert!(selectors.contains("env", ""));
        assert!(!selectors.matches(&fm("env: prod")));
        selectors.set("env=prod").unwrap();
        assert!(selectors.matches(&fm("env: prod")));
        assert!(selectors.contains("env", ""));
    }

    #[test]
    fn assignments_are_trimmed() {
        let selectors = Selectors::from_assignments([" env = prod "]).unwrap();
        assert!(selectors.contains("env", "prod"));
    }

    #[test]
    fn malformed_assignment_is_rejected() {
        assert!(Selectors::from_assignments(["env"]).is_err());
        assert!(Selectors::from_assignments(["=prod"]).is_err());
    }

    #[test]
    fn merge_expands_lists() {
        let task = fm("selectors:\n  env: prod\n  lang: [go, rust]\n");
        let mut selectors = Selectors::from_assignments(["env=dev"]).unwrap();
        selectors.merge(task.selectors().unwrap());
        assert!(selectors.contains("env", "dev"));
        assert!(selectors.contains("env", "prod"));
        assert!(selectors.contains("lang", "go"));
        assert!(selectors.contains("lang", "rust"));
    }
}
