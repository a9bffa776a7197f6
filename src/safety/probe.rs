//! Storage readiness probing.
//!
//! Directory existence is not proof of usability: a network filesystem can
//! report a mount point present but not yet export-ready. The only
//! trustworthy signal is a real write: create a uniquely-named file, write a
//! byte, force it to stable storage, remove it.
//!
//! Runs after the privilege drop so every probe reflects the permissions the
//! application will actually run with.

use crate::config::types::{EntrypointError, ProbeSettings, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Delay before retry number `attempt` (0-based): base * multiplier^attempt,
/// capped at the configured maximum. Pure function; the backoff-bound
/// property is tested against it directly.
pub fn next_interval(settings: &ProbeSettings, attempt: u32) -> Duration {
    let base = settings.base_interval.as_secs_f64();
    let max = settings.max_interval.as_secs_f64();
    let raw = base * settings.multiplier.powi(attempt.min(64) as i32);
    Duration::from_secs_f64(raw.min(max))
}

/// One write-and-fsync probe cycle. Creation of the directory itself is part
/// of the probe: a path that cannot be created is not ready (see DESIGN.md,
/// decided open question 1).
pub fn probe_once(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let marker = dir.join(format!(".initbox-probe-{}", Uuid::new_v4()));
    let mut f = fs::File::create(&marker)?;
    f.write_all(b"1")?;
    f.sync_all()?;
    drop(f);
    fs::remove_file(&marker)?;
    Ok(())
}

/// Block until every path is proven writable, or fail the boot.
///
/// Paths are probed strictly in order; each gets its own full deadline.
pub fn wait_for_storage(settings: &ProbeSettings, paths: &[(String, PathBuf)]) -> Result<()> {
    if !settings.enabled {
        log::info!("Storage readiness probing disabled");
        return Ok(());
    }
    for (key, path) in paths {
        wait_for_path(settings, key, path)?;
    }
    Ok(())
}

fn wait_for_path(settings: &ProbeSettings, key: &str, dir: &Path) -> Result<()> {
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut attempt: u32 = 0;

    loop {
        match probe_once(dir) {
            Ok(()) => {
                log::info!(
                    "Storage ready: {} ({}) after {} attempt(s)",
                    dir.display(),
                    key,
                    attempt + 1
                );
                return Ok(());
            }
            Err(e) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(EntrypointError::StorageNotReady {
                        path: dir.to_path_buf(),
                        waited: settings.timeout,
                    });
                }
                let mut delay = next_interval(settings, attempt);
                // Never sleep past the per-path deadline.
                let remaining = deadline - now;
                if delay > remaining {
                    delay = remaining;
                }
                log::warn!(
                    "Storage probe failed for {} ({}): {}; retrying in {:?}",
                    dir.display(),
                    key,
                    e,
                    delay
                );
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}
