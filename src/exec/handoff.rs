//! Process handoff: replace the entrypoint with the application.
//!
//! The handoff is terminal: no cleanup code can run after it, so the
//! pipeline finalizes all state (config written, privileges dropped, storage
//! proven) before calling it. Tests exercise the pipeline against a mock
//! [`Launcher`]; only the real binary reaches [`ExecLauncher`].

use crate::config::types::{EntrypointError, Result};
use std::convert::Infallible;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// The terminal boundary of the pipeline.
///
/// A successful `launch` never returns: the process image is replaced and
/// the application inherits the process id. Any return is an error.
pub trait Launcher {
    fn launch(&self, target: &Path, args: &[String]) -> Result<Infallible>;
}

/// Real image replacement via execv.
pub struct ExecLauncher;

impl Launcher for ExecLauncher {
    fn launch(&self, target: &Path, args: &[String]) -> Result<Infallible> {
        let program = CString::new(target.as_os_str().as_bytes())
            .map_err(|_| EntrypointError::Exec("target path contains NUL byte".to_string()))?;

        let mut cargv = Vec::with_capacity(args.len() + 1);
        cargv.push(program.clone());
        for arg in args {
            let c = CString::new(arg.as_str())
                .map_err(|_| EntrypointError::Exec("argument contains NUL byte".to_string()))?;
            cargv.push(c);
        }
        let cargv_ref: Vec<&std::ffi::CStr> = cargv.iter().map(|c| c.as_c_str()).collect();

        log::info!("Executing application via execv: {} {:?}", target.display(), args);
        nix::unistd::execv(program.as_c_str(), &cargv_ref)
            .map_err(|e| EntrypointError::Exec(format!("execv failed: {}", e)))
    }
}

/// Argument vector for the application invocation:
/// `<script> -f <config_file> -s <host>:<port>`.
///
/// argv[0] is supplied by the launcher (the interpreter path itself).
pub fn handoff_args(script: &Path, config_file: &Path, host: &str, port: &str) -> Vec<String> {
    vec![
        script.display().to_string(),
        "-f".to_string(),
        config_file.display().to_string(),
        "-s".to_string(),
        format!("{}:{}", host, port),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn handoff_args_follow_the_invocation_contract() {
        let args = handoff_args(
            Path::new("/app/SABnzbd.py"),
            Path::new("/config/sabnzbd.ini"),
            "0.0.0.0",
            "8080",
        );
        assert_eq!(
            args,
            vec![
                "/app/SABnzbd.py",
                "-f",
                "/config/sabnzbd.ini",
                "-s",
                "0.0.0.0:8080",
            ]
        );
    }

    #[test]
    fn exec_launcher_rejects_nul_in_arguments() {
        let err = ExecLauncher
            .launch(Path::new("/bin/true"), &["bad\0arg".to_string()])
            .unwrap_err();
        assert!(matches!(err, EntrypointError::Exec(_)));
    }

    #[test]
    fn exec_launcher_fails_on_missing_target() {
        let missing = PathBuf::from("/definitely/not/a/real/binary");
        let err = ExecLauncher.launch(&missing, &[]).unwrap_err();
        assert!(matches!(err, EntrypointError::Exec(_)));
    }
}
