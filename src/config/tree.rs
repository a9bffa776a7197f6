//! In-memory configuration tree.
//!
//! Two-level nesting only: a section maps option names to either a flat value
//! or one nested subsection mapping. The tagged [`SectionEntry`] makes the
//! writer's branching exhaustive and keeps deeper nesting unrepresentable.

use std::collections::BTreeMap;

/// One entry in a section body: a flat value or a nested subsection.
///
/// A key holds exactly one of the two; a later write under the same key
/// replaces the entry, tag included, so a value and a subsection can never
/// share a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SectionEntry {
    Value(String),
    Nested(BTreeMap<String, String>),
}

/// Section name -> section body. All names and keys are case-folded to
/// lowercase on insertion; `BTreeMap` storage makes iteration (and therefore
/// serialized output) lexicographic by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigTree {
    sections: BTreeMap<String, BTreeMap<String, SectionEntry>>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flat section-level option, replacing any previous entry.
    pub fn set<V: Into<String>>(&mut self, section: &str, option: &str, value: V) {
        self.sections
            .entry(section.to_lowercase())
            .or_default()
            .insert(option.to_lowercase(), SectionEntry::Value(value.into()));
    }

    /// Set a nested option, replacing a flat value of the same name if one
    /// was written earlier (last writer wins, tag included).
    pub fn set_nested<V: Into<String>>(
        &mut self,
        section: &str,
        subsection: &str,
        option: &str,
        value: V,
    ) {
        let body = self.sections.entry(section.to_lowercase()).or_default();
        let entry = body
            .entry(subsection.to_lowercase())
            .or_insert_with(|| SectionEntry::Nested(BTreeMap::new()));
        if let SectionEntry::Value(_) = entry {
            // A flat value and a subsection cannot share a key: retag.
            *entry = SectionEntry::Nested(BTreeMap::new());
        }
        if let SectionEntry::Nested(map) = entry {
            map.insert(option.to_lowercase(), value.into());
        }
    }

    /// Flat value lookup.
    pub fn get(&self, section: &str, option: &str) -> Option<&str> {
        match self.sections.get(&section.to_lowercase())?.get(&option.to_lowercase())? {
            SectionEntry::Value(v) => Some(v.as_str()),
            SectionEntry::Nested(_) => None,
        }
    }

    /// Nested value lookup.
    pub fn get_nested(&self, section: &str, subsection: &str, option: &str) -> Option<&str> {
        match self.sections.get(&section.to_lowercase())?.get(&subsection.to_lowercase())? {
            SectionEntry::Nested(map) => map.get(&option.to_lowercase()).map(String::as_str),
            SectionEntry::Value(_) => None,
        }
    }

    /// Iterate sections in lexicographic order.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, SectionEntry>)> {
        self.sections.iter().map(|(name, body)| (name.as_str(), body))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
