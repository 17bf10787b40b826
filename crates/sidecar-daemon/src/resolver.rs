//! Executable resolution
//!
//! Maps the current platform to the helper binary bundled under the
//! installation root and makes sure it can be executed.

use std::path::{Path, PathBuf};

use sidecar_core::prelude::*;
use sidecar_core::{DiagnosticSink, PlatformTarget};

/// Directory under the installation root holding the bundled binaries
pub const BINARIES_DIR: &str = "binaries";

/// A helper executable ready to be spawned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedExecutable {
    pub target: PlatformTarget,
    /// Absolute path to the binary
    pub path: PathBuf,
    /// Set when the executable bit could not be applied
    pub permission_warning: Option<String>,
}

impl ResolvedExecutable {
    /// Working directory for the helper: the directory holding the binary
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or(&self.path)
    }
}

/// Resolve the helper binary for `os` inside `binaries_dir`.
///
/// A permission failure on non-Windows targets is recorded as a warning and
/// does not fail resolution; the spawn is allowed to fail instead.
pub fn resolve_executable(
    os: &str,
    binaries_dir: &Path,
    sink: &DiagnosticSink,
) -> std::result::Result<ResolvedExecutable, StartError> {
    resolve_with(os, binaries_dir, sink, ensure_executable)
}

fn resolve_with(
    os: &str,
    binaries_dir: &Path,
    sink: &DiagnosticSink,
    make_executable: impl FnOnce(&Path) -> std::io::Result<()>,
) -> std::result::Result<ResolvedExecutable, StartError> {
    let target = PlatformTarget::from_os(os).ok_or_else(|| StartError::platform_unsupported(os))?;

    let candidate = binaries_dir.join(target.executable_name());
    if !candidate.is_file() {
        return Err(StartError::BinaryMissing { path: candidate });
    }

    let path = dunce::canonicalize(&candidate)
        .map_err(|_| StartError::BinaryMissing { path: candidate })?;

    let permission_warning = if target.needs_exec_permission() {
        match make_executable(&path) {
            Ok(()) => {
                sink.info(format!("Set executable permission for: {}", path.display()));
                None
            }
            Err(e) => {
                let warning = format!("Could not set executable permission: {}", e);
                sink.warn(format!("Warning: {}", warning));
                Some(warning)
            }
        }
    } else {
        None
    };

    debug!("Resolved {} helper at {}", target, path.display());

    Ok(ResolvedExecutable {
        target,
        path,
        permission_warning,
    })
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn ensure_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
