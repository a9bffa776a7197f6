//! Environment snapshot and environment-derived inputs.
//!
//! The ambient process environment is read exactly once, at startup. Every
//! later stage receives the same [`EnvSnapshot`], so no two stages can observe
//! different environments.

pub mod overrides;
pub mod sanitize;

use std::collections::BTreeMap;

/// Immutable snapshot of the process environment.
///
/// Backed by a `BTreeMap` so iteration order (and therefore override
/// application order) is deterministic across runs.
#[derive(Clone, Debug, Default)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs (tests, embedding).
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw value of a variable, exactly as captured.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Sanitized value of a variable (trimmed, one outer quote pair removed).
    pub fn sanitized(&self, name: &str) -> Option<String> {
        self.raw(name).map(sanitize::sanitize)
    }

    /// Iterate all captured variables in deterministic (lexicographic) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_pairs_roundtrips() {
        let snap = EnvSnapshot::from_pairs([("A", "1"), ("B", "2")]);
        assert_eq!(snap.raw("A"), Some("1"));
        assert_eq!(snap.raw("C"), None);
    }

    #[test]
    fn sanitized_strips_quotes() {
        let snap = EnvSnapshot::from_pairs([("HOST", "\"0.0.0.0\"")]);
        assert_eq!(snap.sanitized("HOST").as_deref(), Some("0.0.0.0"));
    }

    #[test]
    fn iteration_order_is_deterministic() {
        let snap = EnvSnapshot::from_pairs([("Z", "1"), ("A", "2"), ("M", "3")]);
        let keys: Vec<&str> = snap.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "M", "Z"]);
    }
}
