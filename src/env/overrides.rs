//! Parsing of `SAB__`-prefixed configuration overrides.
//!
//! Naming convention: `SAB__<section>__<option>` sets a section-level key,
//! `SAB__<section>__<subsection>__<option>` sets a nested key. Any other
//! arity is silently ignored so unrelated environment variables can never
//! abort startup.

use crate::env::{sanitize::sanitize, EnvSnapshot};

/// Variable-name prefix selecting override variables, including the separator.
pub const OVERRIDE_PREFIX: &str = "SAB__";

/// Separator between name components.
pub const SEPARATOR: &str = "__";

/// Logical address of one configuration key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverrideKey {
    pub section: String,
    pub subsection: Option<String>,
    pub option: String,
}

/// One environment-driven instruction to set one key to one value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Override {
    pub key: OverrideKey,
    pub value: String,
}

/// Extract all overrides from the snapshot, in snapshot iteration order.
///
/// Name components are case-folded to lowercase so `SAB__Misc__PORT` and
/// `SAB__misc__port` address the same key; values pass through
/// [`sanitize`]. Pure transform: nothing here touches the filesystem.
pub fn parse_overrides(env: &EnvSnapshot) -> Vec<Override> {
    let mut out = Vec::new();
    for (name, raw) in env.iter() {
        let matches_prefix = name
            .get(..OVERRIDE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(OVERRIDE_PREFIX));
        if !matches_prefix {
            continue;
        }
        let rest = &name[OVERRIDE_PREFIX.len()..];
        let parts: Vec<&str> = rest.split(SEPARATOR).collect();
        let key = match parts.as_slice() {
            [section, option] if !section.is_empty() && !option.is_empty() => OverrideKey {
                section: section.to_lowercase(),
                subsection: None,
                option: option.to_lowercase(),
            },
            [section, subsection, option]
                if !section.is_empty() && !subsection.is_empty() && !option.is_empty() =>
            {
                OverrideKey {
                    section: section.to_lowercase(),
                    subsection: Some(subsection.to_lowercase()),
                    option: option.to_lowercase(),
                }
            }
            _ => {
                log::debug!("Ignoring environment variable {} (not a valid override)", name);
                continue;
            }
        };
        out.push(Override {
            key,
            value: sanitize(raw),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Vec<Override> {
        parse_overrides(&EnvSnapshot::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn parses_section_option() {
        let got = parse(&[("SAB__misc__port", "9090")]);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key.section, "misc");
        assert_eq!(got[0].key.subsection, None);
        assert_eq!(got[0].key.option, "port");
        assert_eq!(got[0].value, "9090");
    }

    #[test]
    fn parses_section_subsection_option() {
        let got = parse(&[("SAB__servers__news.example.com__username", "alice")]);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].key.subsection.as_deref(), Some("news.example.com"));
        assert_eq!(got[0].key.option, "username");
    }

    #[test]
    fn folds_component_case() {
        let got = parse(&[("SAB__Misc__PORT", "9090")]);
        assert_eq!(got[0].key.section, "misc");
        assert_eq!(got[0].key.option, "port");
    }

    #[test]
    fn ignores_wrong_arity() {
        assert!(parse(&[("SAB__misc", "x")]).is_empty());
        assert!(parse(&[("SAB__a__b__c__d", "x")]).is_empty());
    }

    #[test]
    fn ignores_empty_components() {
        assert!(parse(&[("SAB____port", "x")]).is_empty());
        assert!(parse(&[("SAB__misc__", "x")]).is_empty());
    }

    #[test]
    fn ignores_unrelated_variables() {
        assert!(parse(&[("PATH", "/usr/bin"), ("SAB_HOST", "::")]).is_empty());
    }

    #[test]
    fn sanitizes_values() {
        let got = parse(&[("SAB__misc__api_key", " \"secret\" ")]);
        assert_eq!(got[0].value, "secret");
    }

    #[test]
    fn preserves_snapshot_order() {
        let got = parse(&[
            ("SAB__b__opt", "2"),
            ("SAB__a__opt", "1"),
        ]);
        // Snapshot iteration is lexicographic over variable names.
        assert_eq!(got[0].key.section, "a");
        assert_eq!(got[1].key.section, "b");
    }
}
