//! Request parameters for the action API.
//!
//! Parameters keep insertion order. On the wire:
//! - lists are joined with `|` (empty lists are dropped)
//! - `true` flags are sent as `1`, `false` flags are dropped, since the API
//!   treats any present boolean parameter as set

use serde_json::{Map, Value};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Flag(bool),
    List(Vec<String>),
}

impl ParamValue {
    /// Wire form, or `None` when the value is not sent at all.
    #[must_use]
    pub fn to_wire(&self) -> Option<String> {
        match self {
            ParamValue::Text(text) => Some(text.clone()),
            ParamValue::Int(n) => Some(n.to_string()),
            ParamValue::Flag(true) => Some("1".to_owned()),
            ParamValue::Flag(false) => None,
            ParamValue::List(items) if items.is_empty() => None,
            ParamValue::List(items) => Some(items.join("|")),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => ParamValue::Text(s.clone()),
            Value::Bool(b) => ParamValue::Flag(*b),
            Value::Number(n) => n
                .as_i64()
                .map_or_else(|| ParamValue::Text(n.to_string()), ParamValue::Int),
            Value::Array(items) => ParamValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            other => ParamValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Text(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

// Page and revision ids are unsigned; sent as text to avoid a lossy cast.
impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<&[String]> for ParamValue {
    fn from(value: &[String]) -> Self {
        ParamValue::List(value.to_vec())
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ParamValue {
    fn from(value: [&str; N]) -> Self {
        ParamValue::List(value.into_iter().map(str::to_owned).collect())
    }
}

impl From<&[i32]> for ParamValue {
    fn from(value: &[i32]) -> Self {
        ParamValue::List(value.iter().map(ToString::to_string).collect())
    }
}

impl From<&[u64]> for ParamValue {
    fn from(value: &[u64]) -> Self {
        ParamValue::List(value.iter().map(ToString::to_string).collect())
    }
}

/// Ordered parameter map. Setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    /// Set `key` when `value` is present; leave the map untouched otherwise.
    pub fn set_opt<V: Into<ParamValue>>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Set a list-valued key unless the list is empty.
    pub(crate) fn set_list<T: ToString>(&mut self, key: &str, items: &[T]) -> &mut Self {
        if !items.is_empty() {
            self.set(
                key,
                ParamValue::List(items.iter().map(ToString::to_string).collect()),
            );
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Copy every entry of `other` into `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Params) -> &mut Self {
        for (key, value) in &other.entries {
            self.set(key.as_str(), value.clone());
        }
        self
    }

    /// Merge the fields of a server `continue` object.
    pub fn merge_continue(&mut self, cont: &Map<String, Value>) -> &mut Self {
        for (key, value) in cont {
            self.set(key.as_str(), ParamValue::from_json(value));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded `(name, value)` pairs, skipping values that are not sent.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.to_wire().map(|wire| (key.clone(), wire)))
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(params: &Params) -> Vec<(String, String)> {
        params.to_pairs()
    }

    #[test]
    fn test_wire_encoding() {
        let params = Params::new()
            .with("list", "categorymembers")
            .with("cmnamespace", &[0, 14][..])
            .with("cmprop", ["ids", "title"])
            .with("cmlimit", 50)
            .with("redirects", true)
            .with("bot", false)
            .with("cmtype", Vec::<String>::new());

        assert_eq!(
            pairs(&params),
            vec![
                ("list".to_owned(), "categorymembers".to_owned()),
                ("cmnamespace".to_owned(), "0|14".to_owned()),
                ("cmprop".to_owned(), "ids|title".to_owned()),
                ("cmlimit".to_owned(), "50".to_owned()),
                ("redirects".to_owned(), "1".to_owned()),
            ]
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut params = Params::new().with("a", "1").with("b", "2");
        params.set("a", "3");
        assert_eq!(
            pairs(&params),
            vec![("a".to_owned(), "3".to_owned()), ("b".to_owned(), "2".to_owned())]
        );
    }

    #[test]
    fn test_merge_other_wins() {
        let mut base = Params::new().with("limit", "max").with("extra", "x");
        let fixed = Params::new().with("limit", 10);
        base.merge(&fixed);
        assert_eq!(base.get("limit"), Some(&ParamValue::Int(10)));
        assert_eq!(base.get("extra"), Some(&ParamValue::Text("x".into())));
    }

    #[test]
    fn test_merge_continue() {
        let cont = json!({"continue": "-||", "sroffset": 20, "cmcontinue": "page|4f|123"});
        let mut params = Params::new().with("list", "search").with("sroffset", 10);
        params.merge_continue(cont.as_object().unwrap());

        assert_eq!(params.get("sroffset"), Some(&ParamValue::Int(20)));
        assert_eq!(
            params.get("cmcontinue"),
            Some(&ParamValue::Text("page|4f|123".into()))
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_set_opt_and_remove() {
        let mut params = Params::new();
        params.set_opt("ucstart", None::<&str>);
        params.set_opt("ucend", Some("2024-01-01T00:00:00Z"));
        assert!(!params.contains_key("ucstart"));
        assert!(params.contains_key("ucend"));
        assert!(params.remove("ucend").is_some());
        assert!(params.is_empty());
    }

    #[test]
    fn test_from_iterator() {
        let params: Params = [("action", "query"), ("meta", "tokens")].into_iter().collect();
        assert_eq!(params.len(), 2);
    }
}
