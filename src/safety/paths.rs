//! Path safety validation against an allow-listed root set.
//!
//! Overrides are fully dynamic, so the allow-list cannot be a static constant:
//! it is derived at boot from the config directory plus the top-level mounts
//! the convenience folder variables actually point at. Override values never
//! contribute roots: an override must resolve under roots established
//! independently of it.

use crate::config::types::{EntrypointError, Result, Settings};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// An absolute, symlink-resolved path together with the allow-listed root
/// that contains it. Recomputed on every boot; never cached across restarts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    path: PathBuf,
    root: PathBuf,
}

impl ResolvedPath {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// The set of filesystem roots under which any managed path must resolve.
#[derive(Clone, Debug)]
pub struct AllowedRootSet {
    roots: BTreeSet<PathBuf>,
}

impl AllowedRootSet {
    /// Derive the root set from the boot settings: the config directory,
    /// `/tmp`, the top-level segment of each convenience folder path, and any
    /// explicit `SAB_ALLOWED_ROOTS` extras.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut roots = BTreeSet::new();
        roots.insert(resolve_root(&settings.config_dir));
        roots.insert(PathBuf::from("/tmp"));

        let folders = [
            settings.download_root.as_path(),
            settings.incomplete_dir.as_path(),
            settings.complete_dir.as_path(),
            settings.nzb_backup_dir.as_path(),
        ];
        for folder in folders {
            if let Some(top) = top_level_segment(folder) {
                roots.insert(top);
            }
        }
        for extra in &settings.allowed_root_extras {
            roots.insert(resolve_root(extra));
        }

        log::info!("Allowed roots: {:?}", roots);
        AllowedRootSet { roots }
    }

    /// Build a root set from explicit members (tests).
    pub fn from_roots<I: IntoIterator<Item = PathBuf>>(roots: I) -> Self {
        AllowedRootSet {
            roots: roots.into_iter().collect(),
        }
    }

    /// Resolve `raw` to an absolute, symlink-free canonical form and accept it
    /// only if it equals or descends from an allow-listed root.
    ///
    /// The target does not need to exist yet. Nothing is created here; on the
    /// failure path the filesystem is untouched.
    pub fn resolve_and_validate(&self, raw: &Path) -> Result<ResolvedPath> {
        if !raw.is_absolute() {
            return Err(EntrypointError::PathNotAbsolute(raw.to_path_buf()));
        }
        let canonical = soft_canonicalize::soft_canonicalize(raw)?;
        for root in &self.roots {
            if canonical.starts_with(root) {
                return Ok(ResolvedPath {
                    path: canonical,
                    root: root.clone(),
                });
            }
        }
        Err(EntrypointError::PathOutsideAllowedRoots {
            path: canonical,
            roots: self.roots.iter().cloned().collect(),
        })
    }
}

/// First path component under the filesystem root: `/downloads/incomplete`
/// -> `/downloads`. Returns None for `/` itself.
pub fn top_level_segment(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::RootDir) => {}
        _ => return None,
    }
    match components.next() {
        Some(Component::Normal(first)) => Some(Path::new("/").join(first)),
        _ => None,
    }
}

/// Create a validated directory (and parents) idempotently.
///
/// `required` escalates creation failure into an error; otherwise it is a
/// logged warning and the boot continues, because the downstream application
/// re-checks its own folders (some deployments pre-provision paths with
/// permissions the entrypoint cannot create under).
pub fn ensure_dir(resolved: &ResolvedPath, required: bool) -> Result<()> {
    match fs::create_dir_all(resolved.path()) {
        Ok(()) => Ok(()),
        Err(e) if !required => {
            log::warn!(
                "Could not create directory {}: {} (continuing)",
                resolved.path().display(),
                e
            );
            Ok(())
        }
        Err(e) => Err(EntrypointError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory {}: {}", resolved.path().display(), e),
        ))),
    }
}

// Roots themselves are symlink-resolved so containment compares like with
// like; a root that cannot be resolved is kept as given.
fn resolve_root(path: &Path) -> PathBuf {
    match soft_canonicalize::soft_canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => path.to_path_buf(),
    }
}
