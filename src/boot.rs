//! The sequential boot pipeline.
//!
//! Strictly ordered, single-threaded: each stage's correctness depends on the
//! previous stage's completed side effect. The config file is written before
//! the privilege drop; the drop happens before the storage probes, so every
//! probe runs with exactly the permissions the application will have; the
//! handoff is last and terminal.

use crate::config::builder::build_tree;
use crate::config::tree::ConfigTree;
use crate::config::types::{EntrypointError, Result, Settings};
use crate::config::writer::{parse_ini, to_ini_string, write_atomic};
use crate::env::overrides::parse_overrides;
use crate::env::EnvSnapshot;
use crate::exec::handoff::{handoff_args, Launcher};
use crate::kernel::credentials::drop_privileges;
use crate::observability::audit::{BootAudit, BootEventType};
use crate::safety::paths::{ensure_dir, AllowedRootSet};
use crate::safety::probe::wait_for_storage;
use std::fs;
use std::path::PathBuf;

/// How a pipeline run ended without an error.
///
/// A full boot never constructs a value of this type: the handoff replaces
/// the process image. Only a `--check` run returns.
#[derive(Debug, PartialEq, Eq)]
pub enum BootOutcome {
    CheckComplete,
}

/// Run the boot pipeline over one environment snapshot.
pub fn run(env: &EnvSnapshot, check_only: bool, launcher: &dyn Launcher) -> Result<BootOutcome> {
    let audit = BootAudit::new();
    audit.emit(BootEventType::BootStart, "entrypoint pipeline starting");

    let mut settings = Settings::from_snapshot(env)?;
    let roots = AllowedRootSet::from_settings(&settings);

    // The config directory must exist before anything else: the generated
    // file, and later the application's own state, live under it.
    let config_dir = validate(&audit, &roots, &settings.config_dir)?;
    ensure_dir(&config_dir, true)?;
    settings.config_dir = config_dir.path().to_path_buf();
    settings.config_file = settings.config_dir.join(crate::config::types::CONFIG_FILE_NAME);

    // Convenience folders: validate, provision, and store the canonical
    // form so the written configuration carries symlink-free paths. Creation
    // failure is not fatal here; wait-eligible paths are retried by the
    // prober, the rest are the application's own concern.
    settings.incomplete_dir = provision(&audit, &roots, &settings.incomplete_dir)?;
    settings.complete_dir = provision(&audit, &roots, &settings.complete_dir)?;
    settings.nzb_backup_dir = provision(&audit, &roots, &settings.nzb_backup_dir)?;

    let overrides = parse_overrides(env);
    let previous = previous_tree(&settings);
    let tree = match build_tree(&settings, &roots, &overrides, previous) {
        Ok(tree) => tree,
        Err(e) => return Err(audit_rejection(&audit, e)),
    };

    let content = to_ini_string(&tree);
    write_atomic(&settings.config_file, content.as_bytes())?;
    audit.emit(
        BootEventType::ConfigWritten,
        settings.config_file.display().to_string(),
    );

    if check_only {
        log::info!("Check mode: configuration written, stopping before privilege drop");
        return Ok(BootOutcome::CheckComplete);
    }

    chown_config_dir(&settings);

    drop_privileges(&settings.privilege)?;
    audit.emit(
        BootEventType::PrivilegeDropped,
        format!("uid={} gid={}", settings.privilege.uid, settings.privilege.gid),
    );

    // Post-drop probes observe production write conditions.
    let probe_paths = probe_paths(&settings, &tree);
    match wait_for_storage(&settings.probe, &probe_paths) {
        Ok(()) => audit.emit(
            BootEventType::StorageReady,
            format!("{} path(s) proven writable", probe_paths.len()),
        ),
        Err(e) => {
            audit.emit(BootEventType::StorageTimeout, e.to_string());
            return Err(e);
        }
    }

    // The application keeps its state under the config directory.
    std::env::set_var("HOME", &settings.config_dir);

    // Bind address comes from the final merged tree so overrides of the
    // bootstrap section take effect on the command line too.
    let host = tree
        .get("misc", "host")
        .unwrap_or(settings.host.as_str())
        .to_string();
    let port = tree
        .get("misc", "port")
        .map(str::to_string)
        .unwrap_or_else(|| settings.port.to_string());

    let args = handoff_args(&settings.app_script, &settings.config_file, &host, &port);
    audit.emit(
        BootEventType::Handoff,
        format!("{} {:?}", settings.app_python.display(), args),
    );
    match launcher.launch(&settings.app_python, &args) {
        Ok(never) => match never {},
        Err(e) => Err(e),
    }
}

fn validate(
    audit: &BootAudit,
    roots: &AllowedRootSet,
    path: &std::path::Path,
) -> Result<crate::safety::paths::ResolvedPath> {
    roots
        .resolve_and_validate(path)
        .map_err(|e| audit_rejection(audit, e))
}

fn provision(
    audit: &BootAudit,
    roots: &AllowedRootSet,
    path: &std::path::Path,
) -> Result<PathBuf> {
    let resolved = validate(audit, roots, path)?;
    ensure_dir(&resolved, false)?;
    Ok(resolved.path().to_path_buf())
}

fn audit_rejection(audit: &BootAudit, e: EntrypointError) -> EntrypointError {
    if matches!(
        e,
        EntrypointError::PathOutsideAllowedRoots { .. } | EntrypointError::PathNotAbsolute(_)
    ) {
        audit.emit(BootEventType::PathRejected, e.to_string());
    }
    e
}

// Carry unmanaged keys forward only when the operator opted out of
// overwriting. Read problems degrade to a fresh build, never a failed boot.
fn previous_tree(settings: &Settings) -> Option<ConfigTree> {
    if settings.overwrite_config || !settings.config_file.exists() {
        return None;
    }
    match fs::read_to_string(&settings.config_file) {
        Ok(text) => Some(parse_ini(&text)),
        Err(e) => {
            log::warn!(
                "Could not read existing config {}: {} (rebuilding from scratch)",
                settings.config_file.display(),
                e
            );
            None
        }
    }
}

// Wait-eligible paths: the configured folder keys, resolved against the
// final merged tree so overrides are probed, not the defaults they replaced.
fn probe_paths(settings: &Settings, tree: &ConfigTree) -> Vec<(String, PathBuf)> {
    let mut out = Vec::new();
    for key in &settings.probe.folder_keys {
        match tree.get("folders", key) {
            Some(path) => out.push((key.clone(), PathBuf::from(path))),
            None => log::warn!("Wait folder key '{}' has no folders entry, skipping", key),
        }
    }
    out
}

fn chown_config_dir(settings: &Settings) {
    use nix::unistd::{chown, Gid, Uid};
    let (uid, gid) = (settings.privilege.uid, settings.privilege.gid);
    if let Err(e) = chown(
        &settings.config_dir,
        Some(Uid::from_raw(uid)),
        Some(Gid::from_raw(gid)),
    ) {
        // The application can still run if the directory was pre-provisioned
        // with usable permissions; keep operator visibility and continue.
        log::warn!(
            "Could not chown {} to {}:{}: {}",
            settings.config_dir.display(),
            uid,
            gid,
            e
        );
    }
}
