//! Staged merge of defaults, convenience-derived values, and overrides.
//!
//! Each boot recomputes intended state from the snapshot alone: the previous
//! on-disk file never decides what a managed key holds, so removing an
//! environment variable returns its key to the default on the next restart.

use crate::config::tree::ConfigTree;
use crate::config::types::{Result, Settings};
use crate::env::overrides::Override;
use crate::safety::paths::{ensure_dir, AllowedRootSet};
use std::path::Path;

/// Build the configuration tree for this boot.
///
/// Merge order, later stages overwriting earlier ones:
/// 1. bootstrap defaults (bind host/port),
/// 2. folder layout derived from the downloads root and the explicit
///    convenience folder variables (already folded into `settings`),
/// 3. parsed `SAB__` overrides, with `folders/*_dir` values routed through
///    the path validator before they are stored.
///
/// `previous` carries unmanaged keys of a pre-existing file when the operator
/// opted out of overwriting; every managed stage writes on top of it, so a
/// preserved key can never mask a value the builder is asked to set.
pub fn build_tree(
    settings: &Settings,
    roots: &AllowedRootSet,
    overrides: &[Override],
    previous: Option<ConfigTree>,
) -> Result<ConfigTree> {
    let mut tree = previous.unwrap_or_default();

    // Stage 1: bootstrap defaults.
    tree.set("misc", "host", settings.host.clone());
    tree.set("misc", "port", settings.port.to_string());

    // Stage 2: folder layout (downloads-root derivation and convenience
    // variables are collapsed in Settings; outcome is identical).
    tree.set("folders", "download_dir", settings.incomplete_dir.display().to_string());
    tree.set("folders", "complete_dir", settings.complete_dir.display().to_string());
    tree.set("folders", "nzb_backup_dir", settings.nzb_backup_dir.display().to_string());

    // Stage 3: environment overrides, strictly last so a reserved bootstrap
    // key like misc/port can still be overridden.
    for ov in overrides {
        let value = if is_folder_path_override(ov) {
            let resolved = roots.resolve_and_validate(Path::new(&ov.value))?;
            ensure_dir(&resolved, false)?;
            resolved.path().display().to_string()
        } else {
            ov.value.clone()
        };
        match &ov.key.subsection {
            None => tree.set(&ov.key.section, &ov.key.option, value),
            Some(subsection) => tree.set_nested(&ov.key.section, subsection, &ov.key.option, value),
        }
    }

    Ok(tree)
}

// Folder-category overrides carry filesystem paths and must pass containment.
fn is_folder_path_override(ov: &Override) -> bool {
    ov.key.section == "folders" && ov.key.subsection.is_none() && ov.key.option.ends_with("_dir")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{EntrypointError, Settings};
    use crate::env::overrides::parse_overrides;
    use crate::env::EnvSnapshot;

    fn build_from(pairs: &[(&str, &str)]) -> Result<(Settings, ConfigTree)> {
        let env = EnvSnapshot::from_pairs(pairs.iter().copied());
        let settings = Settings::from_snapshot(&env)?;
        let roots = AllowedRootSet::from_settings(&settings);
        let overrides = parse_overrides(&env);
        let tree = build_tree(&settings, &roots, &overrides, None)?;
        Ok((settings, tree))
    }

    #[test]
    fn defaults_populate_bootstrap_and_folders() {
        let (_, tree) = build_from(&[("SAB_DOWNLOAD_DIR", "/downloads")]).unwrap();
        assert_eq!(tree.get("misc", "host"), Some("0.0.0.0"));
        assert_eq!(tree.get("misc", "port"), Some("8080"));
        assert_eq!(tree.get("folders", "download_dir"), Some("/downloads/incomplete"));
        assert_eq!(tree.get("folders", "complete_dir"), Some("/downloads/complete"));
        assert_eq!(tree.get("folders", "nzb_backup_dir"), Some("/downloads/nzb-backup"));
    }

    #[test]
    fn override_wins_over_bootstrap_default() {
        let (_, tree) = build_from(&[("SAB__misc__port", "9090")]).unwrap();
        assert_eq!(tree.get("misc", "port"), Some("9090"));
    }

    #[test]
    fn override_wins_over_convenience_value() {
        let base = std::env::temp_dir()
            .canonicalize()
            .unwrap()
            .join(format!("initbox-builder-{}", uuid::Uuid::new_v4()));
        let target = base.join("elsewhere");
        let (_, tree) = build_from(&[
            ("SAB_INCOMPLETE_DIR", "/downloads/incomplete"),
            ("SAB_ALLOWED_ROOTS", base.to_str().unwrap()),
            ("SAB__folders__download_dir", target.to_str().unwrap()),
        ])
        .unwrap();
        assert_eq!(tree.get("folders", "download_dir"), Some(target.to_str().unwrap()));
        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn nested_override_lands_in_subsection() {
        let (_, tree) = build_from(&[("SAB__servers__news.example.com__username", "alice")]).unwrap();
        assert_eq!(
            tree.get_nested("servers", "news.example.com", "username"),
            Some("alice")
        );
    }

    #[test]
    fn folder_override_outside_roots_is_fatal() {
        let err = build_from(&[("SAB__folders__download_dir", "/etc/evil")]).unwrap_err();
        assert!(matches!(err, EntrypointError::PathOutsideAllowedRoots { .. }));
        assert!(!std::path::Path::new("/etc/evil").exists());
    }

    #[test]
    fn non_folder_override_is_not_path_checked() {
        // misc options are opaque values, not managed paths.
        let (_, tree) = build_from(&[("SAB__misc__script_dir_note", "not-a-path")]).unwrap();
        assert_eq!(tree.get("misc", "script_dir_note"), Some("not-a-path"));
    }

    #[test]
    fn preserved_keys_survive_but_never_mask_managed_ones() {
        let env = EnvSnapshot::from_pairs([("SAB_PORT", "7070")]);
        let settings = Settings::from_snapshot(&env).unwrap();
        let roots = AllowedRootSet::from_settings(&settings);

        let mut previous = ConfigTree::new();
        previous.set("misc", "api_key", "manual-edit");
        previous.set("misc", "port", "1234"); // stale managed key

        let tree = build_tree(&settings, &roots, &[], Some(previous)).unwrap();
        assert_eq!(tree.get("misc", "api_key"), Some("manual-edit"));
        assert_eq!(tree.get("misc", "port"), Some("7070"));
    }

    #[test]
    fn building_twice_is_identical() {
        let pairs = [
            ("SAB_DOWNLOAD_DIR", "/downloads"),
            ("SAB__misc__port", "9090"),
            ("SAB__servers__primary__host", "news.example.com"),
        ];
        let (_, first) = build_from(&pairs).unwrap();
        let (_, second) = build_from(&pairs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn folder_override_with_relative_path_is_fatal() {
        let err = build_from(&[("SAB__folders__download_dir", "relative/dir")]).unwrap_err();
        assert!(matches!(err, EntrypointError::PathNotAbsolute(_)));
    }
}
