use std::fs::OpenOptions;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Decides whether a report may be written into a directory.
pub trait PermissionGate: Send + Sync {
    fn storage_write(&self, dir: &Path) -> Permission;
}

/// A gate with a fixed answer. `Granted` stands in for platforms that need no
/// runtime grant.
impl PermissionGate for Permission {
    fn storage_write(&self, _dir: &Path) -> Permission {
        *self
    }
}

/// Creates the directory if needed and probes it with a throwaway file.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemGate;

const PROBE_FILE: &str = ".moneyspend-write-probe";

impl PermissionGate for FilesystemGate {
    fn storage_write(&self, dir: &Path) -> Permission {
        if let Err(err) = std::fs::create_dir_all(dir) {
            tracing::debug!(dir = %dir.display(), "cannot create report directory: {err}");
            return Permission::Denied;
        }

        let probe = dir.join(PROBE_FILE);
        match OpenOptions::new().write(true).create(true).truncate(true).open(&probe) {
            Ok(_) => {
                if let Err(err) = std::fs::remove_file(&probe) {
                    tracing::debug!(probe = %probe.display(), "failed to remove probe: {err}");
                }
                Permission::Granted
            }
            Err(err) => {
                tracing::debug!(dir = %dir.display(), "report directory is not writable: {err}");
                Permission::Denied
            }
        }
    }
}
