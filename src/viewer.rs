use crate::AppError;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Opens `path` in the configured viewer, or the platform default one.
///
/// A configured viewer is only launched: it usually lives as long as its
/// window. The platform opener hands the file off and exits, and a failing
/// exit means no application handles PDFs.
pub async fn open_report(path: &Path, viewer: Option<&str>) -> Result<(), AppError> {
    if !path.is_file() {
        return Err(AppError::MissingReport(path.to_path_buf()));
    }

    match viewer {
        Some(program) => launch(Command::new(program), path, false).await,
        None => launch(platform_command(), path, true).await,
    }
}

async fn launch(mut command: Command, path: &Path, wait: bool) -> Result<(), AppError> {
    command
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    tracing::debug!(?command, wait, "launching viewer");

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(AppError::NoViewer),
        Err(source) => {
            return Err(AppError::Io {
                source,
                context: format!("Failed to launch viewer for {}", path.display()),
            });
        }
    };
    if !wait {
        return Ok(());
    }

    let status = child.wait().await.map_err(|source| AppError::Io {
        source,
        context: format!("Failed to wait for viewer of {}", path.display()),
    })?;
    if status.success() {
        Ok(())
    } else {
        tracing::debug!(%status, "platform opener exited unsuccessfully");
        Err(AppError::NoViewer)
    }
}

#[cfg(target_os = "macos")]
fn platform_command() -> Command {
    Command::new("open")
}

#[cfg(target_os = "windows")]
fn platform_command() -> Command {
    let mut command = Command::new("cmd");
    command.args(["/C", "start", ""]);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command() -> Command {
    Command::new("xdg-open")
}
