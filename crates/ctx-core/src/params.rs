use crate::error::{CtxError, Result};
use crate::task::decode_value;
use serde::Serialize;
use std::collections::BTreeMap;

/// Parameter table used by `${name}` substitution. Later writes win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `key=value` assignments as given on the command line.
    pub fn from_assignments<I, S>(items: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Self::new();
        for item in items {
            let (key, value) = parse_assignment(item.as_ref())
                .ok_or_else(|| CtxError::InvalidParam(item.as_ref().to_string()))?;
            params.insert(key, decode_value(value));
        }
        Ok(params)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// A copy of `self` with every entry of `overrides` applied on top.
    pub fn overlay(&self, overrides: &Params) -> Params {
        let mut merged = self.clone();
        merged
            .0
            .extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Split `key=value`, trimming the key. `None` when there is no `=` or the
/// key is empty.
pub(crate) fn parse_assignment(item: &str) -> Option<(&str, &str)> {
    let (key, value) = item.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_assignment_wins() {
        let params = Params::from_assignments(["env=dev", "env=prod", "region=eu"]).unwrap();
        assert_eq!(params.get("env"), Some("prod"));
        assert_eq!(params.get("region"), Some("eu"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn quoted_values_are_decoded() {
        let params = Params::from_assignments([r#"msg="a\tb""#, "raw=a\\tb", "eq=x=y"]).unwrap();
        assert_eq!(params.get("msg"), Some("a\tb"));
        assert_eq!(params.get("raw"), Some("a\\tb"));
        assert_eq!(params.get("eq"), Some("x=y"));
    }

    #[test]
    fn malformed_assignments_are_rejected() {
        assert!(Params::from_assignments(["novalue"]).is_err());
        assert!(Params::from_assignments(["=value"]).is_err());
        assert!(Params::from_assignments(["  =value"]).is_err());
    }

    #[test]
    fn empty_value_is_allowed() {
        let params = Params::from_assignments(["key="]).unwrap();
        assert_eq!(params.get("key"), Some(""));
    }

    #[test]
    fn overlay_prefers_overrides() {
        let base: Params = [("a", "1"), ("b", "2")].into_iter().collect();
        let overrides: Params = [("b", "3"), ("c", "4")].into_iter().collect();
        let merged = base.overlay(&overrides);
        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("3"));
        assert_eq!(merged.get("c"), Some("4"));
        assert_eq!(base.get("b"), Some("2"));
    }
}
