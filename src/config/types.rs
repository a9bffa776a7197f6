/// Core types for the entrypoint pipeline: error taxonomy, environment-derived
/// settings, and the privilege target.
use crate::env::EnvSnapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Convenient Result type for entrypoint operations
pub type Result<T> = std::result::Result<T, EntrypointError>;

/// Error taxonomy for the boot pipeline.
///
/// Everything here is fatal when it reaches the binary; best-effort failures
/// (unmanaged directory creation, config-dir chown) are logged warnings and
/// never constructed as errors.
#[derive(Error, Debug)]
pub enum EntrypointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path is not absolute: {0}")]
    PathNotAbsolute(PathBuf),

    #[error("Path {path} resolves outside the allowed roots {roots:?}")]
    PathOutsideAllowedRoots { path: PathBuf, roots: Vec<PathBuf> },

    #[error("Storage not ready: {path} still unwritable after {waited:?}")]
    StorageNotReady { path: PathBuf, waited: Duration },

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Exec error: {0}")]
    Exec(String),
}

impl EntrypointError {
    /// Process exit code for this failure class, as documented in the README.
    pub fn exit_code(&self) -> i32 {
        match self {
            EntrypointError::Config(_) | EntrypointError::PathNotAbsolute(_) => 2,
            EntrypointError::PathOutsideAllowedRoots { .. } => 3,
            EntrypointError::StorageNotReady { .. } => 4,
            EntrypointError::Privilege(_) => 5,
            EntrypointError::Io(_) | EntrypointError::Exec(_) => 1,
        }
    }
}

/// The (uid, gid) pair the process must end up running as.
///
/// Immutable for the process lifetime once parsed from the snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeTarget {
    pub uid: u32,
    pub gid: u32,
}

/// Storage readiness prober tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Master switch; disabled skips probing entirely.
    pub enabled: bool,
    /// Total per-path deadline before the boot is declared failed.
    pub timeout: Duration,
    /// First retry delay.
    pub base_interval: Duration,
    /// Multiplier applied to the delay after each failed attempt (>= 1.0).
    pub multiplier: f64,
    /// Upper bound on any single retry delay.
    pub max_interval: Duration,
    /// `folders` options whose paths must prove writable before handoff.
    pub folder_keys: Vec<String>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            enabled: true,
            timeout: Duration::from_secs(300),
            base_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
            folder_keys: vec!["download_dir".to_string(), "complete_dir".to_string()],
        }
    }
}

/// All convenience-variable-derived settings, parsed once from the snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the generated configuration file.
    pub config_dir: PathBuf,
    /// Full path of the generated configuration file.
    pub config_file: PathBuf,
    /// When false, unmanaged keys of a pre-existing file are preserved.
    pub overwrite_config: bool,
    /// Downloads root used to derive the default folder layout.
    pub download_root: PathBuf,
    /// In-progress download directory.
    pub incomplete_dir: PathBuf,
    /// Finished download directory.
    pub complete_dir: PathBuf,
    /// NZB backup directory.
    pub nzb_backup_dir: PathBuf,
    /// Bind host for the application.
    pub host: String,
    /// Bind port for the application.
    pub port: u16,
    /// Identity to drop to before probing and handoff.
    pub privilege: PrivilegeTarget,
    /// Extra allow-listed roots, beyond the derived set.
    pub allowed_root_extras: Vec<PathBuf>,
    /// Storage readiness prober tuning.
    pub probe: ProbeSettings,
    /// Interpreter the application is exec'd with.
    pub app_python: PathBuf,
    /// Application script passed to the interpreter.
    pub app_script: PathBuf,
}

/// Name of the generated configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "sabnzbd.ini";

impl Settings {
    /// Parse all convenience variables out of the snapshot.
    ///
    /// Malformed values are configuration errors and abort the boot before
    /// any privilege drop or filesystem mutation.
    pub fn from_snapshot(env: &EnvSnapshot) -> Result<Self> {
        let config_dir = absolute_path_var(env, "SAB_CONFIG_DIR", "/config")?;
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        let overwrite_config = bool_var(env, "SAB_OVERWRITE_CONFIG", true)?;

        let download_root = absolute_path_var(env, "SAB_DOWNLOAD_DIR", "/downloads")?;
        let incomplete_dir = match env.sanitized("SAB_INCOMPLETE_DIR") {
            Some(raw) => require_absolute(&raw)?,
            None => download_root.join("incomplete"),
        };
        let complete_dir = match env.sanitized("SAB_COMPLETE_DIR") {
            Some(raw) => require_absolute(&raw)?,
            None => download_root.join("complete"),
        };
        let nzb_backup_dir = download_root.join("nzb-backup");

        let host = env
            .sanitized("SAB_HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = int_var::<u16>(env, "SAB_PORT", 8080)?;

        let privilege = PrivilegeTarget {
            uid: int_var::<u32>(env, "PUID", 1000)?,
            gid: int_var::<u32>(env, "PGID", 1000)?,
        };

        let allowed_root_extras = env
            .sanitized("SAB_ALLOWED_ROOTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(require_absolute)
                    .collect::<Result<Vec<PathBuf>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let probe = probe_settings(env)?;

        let app_python = absolute_path_var(env, "SAB_APP_PYTHON", "/venv/bin/python")?;
        let app_script = absolute_path_var(env, "SAB_APP_SCRIPT", "/app/SABnzbd.py")?;

        Ok(Settings {
            config_dir,
            config_file,
            overwrite_config,
            download_root,
            incomplete_dir,
            complete_dir,
            nzb_backup_dir,
            host,
            port,
            privilege,
            allowed_root_extras,
            probe,
            app_python,
            app_script,
        })
    }

    /// The folder paths managed by the convenience layer, keyed by option name.
    pub fn convenience_folders(&self) -> Vec<(&'static str, &Path)> {
        vec![
            ("download_dir", self.incomplete_dir.as_path()),
            ("complete_dir", self.complete_dir.as_path()),
            ("nzb_backup_dir", self.nzb_backup_dir.as_path()),
        ]
    }
}

fn probe_settings(env: &EnvSnapshot) -> Result<ProbeSettings> {
    let defaults = ProbeSettings::default();
    let multiplier = float_var(env, "SAB_WAIT_BACKOFF_MULTIPLIER", defaults.multiplier)?;
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(EntrypointError::Config(format!(
            "SAB_WAIT_BACKOFF_MULTIPLIER must be a finite value >= 1.0, got {}",
            multiplier
        )));
    }
    let folder_keys = match env.sanitized("SAB_WAIT_FOLDER_KEYS") {
        Some(raw) => raw
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        None => defaults.folder_keys,
    };
    Ok(ProbeSettings {
        enabled: bool_var(env, "SAB_WAIT_FOR_STORAGE", defaults.enabled)?,
        timeout: Duration::from_secs(int_var::<u64>(
            env,
            "SAB_WAIT_TIMEOUT_SECS",
            defaults.timeout.as_secs(),
        )?),
        base_interval: Duration::from_millis(int_var::<u64>(
            env,
            "SAB_WAIT_BASE_INTERVAL_MS",
            defaults.base_interval.as_millis() as u64,
        )?),
        multiplier,
        max_interval: Duration::from_secs(int_var::<u64>(
            env,
            "SAB_WAIT_MAX_INTERVAL_SECS",
            defaults.max_interval.as_secs(),
        )?),
        folder_keys,
    })
}

fn require_absolute<S: AsRef<str>>(raw: S) -> Result<PathBuf> {
    let path = PathBuf::from(raw.as_ref());
    if !path.is_absolute() {
        return Err(EntrypointError::PathNotAbsolute(path));
    }
    Ok(path)
}

fn absolute_path_var(env: &EnvSnapshot, name: &str, default: &str) -> Result<PathBuf> {
    match env.sanitized(name) {
        Some(raw) => require_absolute(&raw),
        None => Ok(PathBuf::from(default)),
    }
}

fn bool_var(env: &EnvSnapshot, name: &str, default: bool) -> Result<bool> {
    match env.sanitized(name) {
        None => Ok(default),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(EntrypointError::Config(format!(
                "{} must be a boolean, got '{}'",
                name, other
            ))),
        },
    }
}

fn int_var<T: std::str::FromStr>(env: &EnvSnapshot, name: &str, default: T) -> Result<T> {
    match env.sanitized(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| {
            EntrypointError::Config(format!("{} must be an integer, got '{}'", name, raw))
        }),
    }
}

fn float_var(env: &EnvSnapshot, name: &str, default: f64) -> Result<f64> {
    match env.sanitized(name) {
        None => Ok(default),
        Some(raw) => raw.parse::<f64>().map_err(|_| {
            EntrypointError::Config(format!("{} must be a number, got '{}'", name, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_container_layout() {
        let settings = Settings::from_snapshot(&EnvSnapshot::default()).unwrap();
        assert_eq!(settings.config_dir, PathBuf::from("/config"));
        assert_eq!(settings.config_file, PathBuf::from("/config/sabnzbd.ini"));
        assert_eq!(settings.incomplete_dir, PathBuf::from("/downloads/incomplete"));
        assert_eq!(settings.complete_dir, PathBuf::from("/downloads/complete"));
        assert_eq!(settings.nzb_backup_dir, PathBuf::from("/downloads/nzb-backup"));
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.privilege, PrivilegeTarget { uid: 1000, gid: 1000 });
        assert!(settings.overwrite_config);
    }

    #[test]
    fn downloads_root_drives_folder_defaults() {
        let env = EnvSnapshot::from_pairs([("SAB_DOWNLOAD_DIR", "/data/usenet")]);
        let settings = Settings::from_snapshot(&env).unwrap();
        assert_eq!(settings.incomplete_dir, PathBuf::from("/data/usenet/incomplete"));
        assert_eq!(settings.complete_dir, PathBuf::from("/data/usenet/complete"));
        assert_eq!(settings.nzb_backup_dir, PathBuf::from("/data/usenet/nzb-backup"));
    }

    #[test]
    fn explicit_folder_vars_win_over_derivation() {
        let env = EnvSnapshot::from_pairs([
            ("SAB_DOWNLOAD_DIR", "/downloads"),
            ("SAB_INCOMPLETE_DIR", "/scratch/incomplete"),
        ]);
        let settings = Settings::from_snapshot(&env).unwrap();
        assert_eq!(settings.incomplete_dir, PathBuf::from("/scratch/incomplete"));
        assert_eq!(settings.complete_dir, PathBuf::from("/downloads/complete"));
    }

    #[test]
    fn relative_config_dir_is_rejected() {
        let env = EnvSnapshot::from_pairs([("SAB_CONFIG_DIR", "config")]);
        let err = Settings::from_snapshot(&env).unwrap_err();
        assert!(matches!(err, EntrypointError::PathNotAbsolute(_)));
    }

    #[test]
    fn malformed_port_is_a_config_error() {
        let env = EnvSnapshot::from_pairs([("SAB_PORT", "eighty")]);
        let err = Settings::from_snapshot(&env).unwrap_err();
        assert!(matches!(err, EntrypointError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn quoted_values_are_sanitized() {
        let env = EnvSnapshot::from_pairs([("SAB_PORT", "\"9090\""), ("SAB_HOST", " '::' ")]);
        let settings = Settings::from_snapshot(&env).unwrap();
        assert_eq!(settings.port, 9090);
        assert_eq!(settings.host, "::");
    }

    #[test]
    fn backoff_multiplier_below_one_is_rejected() {
        let env = EnvSnapshot::from_pairs([("SAB_WAIT_BACKOFF_MULTIPLIER", "0.5")]);
        assert!(Settings::from_snapshot(&env).is_err());
    }

    #[test]
    fn wait_folder_keys_are_parsed_and_folded() {
        let env = EnvSnapshot::from_pairs([("SAB_WAIT_FOLDER_KEYS", "Download_Dir, nzb_backup_dir")]);
        let settings = Settings::from_snapshot(&env).unwrap();
        assert_eq!(settings.probe.folder_keys, vec!["download_dir", "nzb_backup_dir"]);
    }

    #[test]
    fn allowed_root_extras_must_be_absolute() {
        let env = EnvSnapshot::from_pairs([("SAB_ALLOWED_ROOTS", "/mnt/media, relative")]);
        assert!(Settings::from_snapshot(&env).is_err());
    }
}
