//! Deterministic INI rendering and atomic on-disk replacement.
//!
//! Output ordering is a design invariant, not an accident: sections in
//! lexicographic order, flat keys before `[[subsection]]` blocks within a
//! section, keys lexicographic at every level. Identical trees always render
//! identical bytes, so configuration diffs are stable across boots.

use crate::config::tree::{ConfigTree, SectionEntry};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Format marker emitted at the top of every generated file.
pub const CONFIG_VERSION: &str = "19";

/// Render the tree to the on-disk text format.
///
/// A fixed metadata block leads the file so the downstream application
/// recognizes the format revision and encoding.
pub fn to_ini_string(tree: &ConfigTree) -> String {
    let mut out = String::new();
    out.push_str(&format!("__version__ = {}\n", CONFIG_VERSION));
    out.push_str("__encoding__ = utf-8\n");

    for (section, body) in tree.sections() {
        out.push('\n');
        out.push_str(&format!("[{}]\n", section));
        // Flat keys first; BTreeMap iteration keeps each group lexicographic.
        for (option, entry) in body {
            if let SectionEntry::Value(value) = entry {
                out.push_str(&format!("{} = {}\n", option, value));
            }
        }
        for (subsection, entry) in body {
            if let SectionEntry::Nested(options) = entry {
                out.push_str(&format!("[[{}]]\n", subsection));
                for (option, value) in options {
                    out.push_str(&format!("{} = {}\n", option, value));
                }
            }
        }
    }
    out
}

/// Atomically write content to a file: write to temp -> fsync -> rename ->
/// fsync parent dir. A crash or kill mid-write never leaves a truncated or
/// half-written file at the final path (ext4/xfs can lose renames without the
/// parent dir fsync).
pub fn write_atomic(target: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;

    // Temp file in the same directory so the rename stays on one filesystem.
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        target.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ));

    {
        let mut f = fs::File::create(&temp_path)?;
        f.write_all(content)?;
        f.sync_all()?; // fsync the data
    }

    fs::rename(&temp_path, target)?;

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Lenient reader for pre-existing configuration files.
///
/// Used only when the operator opted out of overwriting, to carry unmanaged
/// keys forward. Metadata markers, comments, and unparseable lines are
/// skipped; nothing here ever aborts a boot.
pub fn parse_ini(text: &str) -> ConfigTree {
    let mut tree = ConfigTree::new();
    let mut section: Option<String> = None;
    let mut subsection: Option<String> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix("[[").and_then(|l| l.strip_suffix("]]")) {
            subsection = Some(name.trim().to_string());
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = Some(name.trim().to_string());
            subsection = None;
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || key.starts_with("__") {
            continue;
        }
        match (&section, &subsection) {
            (Some(sec), None) => tree.set(sec, key, value),
            (Some(sec), Some(sub)) => tree.set_nested(sec, sub, key, value),
            // Top-level keys outside any section are not part of the model.
            (None, _) => {}
        }
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_tree() -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.set("misc", "port", "8080");
        tree.set("misc", "host", "0.0.0.0");
        tree.set("folders", "download_dir", "/downloads/incomplete");
        tree.set_nested("servers", "news.example.com", "username", "alice");
        tree.set_nested("servers", "news.example.com", "priority", "0");
        tree.set("servers", "enable_probing", "1");
        tree
    }

    #[test]
    fn renders_sections_lexicographically_with_metadata_prelude() {
        let text = to_ini_string(&sample_tree());
        let expected = "\
__version__ = 19
__encoding__ = utf-8

[folders]
download_dir = /downloads/incomplete

[misc]
host = 0.0.0.0
port = 8080

[servers]
enable_probing = 1
[[news.example.com]]
priority = 0
username = alice
";
        assert_eq!(text, expected);
    }

    #[test]
    fn rendering_is_idempotent() {
        let tree = sample_tree();
        assert_eq!(to_ini_string(&tree), to_ini_string(&tree));
    }

    #[test]
    fn parse_roundtrips_generated_output() {
        let tree = sample_tree();
        let parsed = parse_ini(&to_ini_string(&tree));
        assert_eq!(parsed, tree);
    }

    #[test]
    fn parse_skips_metadata_comments_and_noise() {
        let parsed = parse_ini(
            "__version__ = 19\n# comment\n; other\n[misc]\nport = 8080\nnoise line\n",
        );
        assert_eq!(parsed.get("misc", "port"), Some("8080"));
        assert_eq!(parsed.get("misc", "noise line"), None);
    }

    #[test]
    fn write_atomic_replaces_content_completely() {
        let dir = std::env::temp_dir().join(format!("initbox-writer-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let target = dir.join("sabnzbd.ini");

        write_atomic(&target, b"first").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");
        write_atomic(&target, b"second").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");

        // No temp residue after a completed write.
        let residue: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(residue.is_empty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn interrupted_write_leaves_original_untouched() {
        let dir = std::env::temp_dir().join(format!("initbox-writer-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let target = dir.join("sabnzbd.ini");
        write_atomic(&target, b"original").unwrap();

        // Simulate a crash after the temp file is flushed but before rename:
        // the temp file exists, the target still holds the previous content.
        let temp = dir.join(format!(".sabnzbd.ini.tmp.{}", std::process::id()));
        fs::write(&temp, b"half-finished").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"original");

        fs::remove_dir_all(&dir).ok();
    }
}
