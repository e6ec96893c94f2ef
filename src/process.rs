use std::{fmt::Display, fs, path::PathBuf, process::ExitCode};

use tracing::{debug, error};

use crate::{error::Error, line::LineId};

/// Detach from the controlling terminal and continue in the background.
///
/// Must happen before any threads (e.g. an async runtime) are started.
/// Standard streams are redirected to `/dev/null` and the working directory becomes `/`.
pub fn daemonize() -> Result<(), Error> {
    nix::unistd::daemon(false, false).map_err(Error::Daemon)
}

/// Record our pid for whoever supervises us.
/// Written once; nothing keeps it up to date or removes it.
pub fn write_pid_file<P: Into<PathBuf>>(run_dir: P, line: &LineId) -> Result<PathBuf, Error> {
    let path = run_dir.into().join(line.pid_file_name());
    let pid = std::process::id();

    fs::write(&path, format!("{pid}\n")).map_err(|source| Error::PidFile {
        path: path.clone(),
        source,
    })?;

    debug!(?path, %pid, "Wrote pid file");

    Ok(path)
}

/// Log a fatal error as one plain record and turn the outcome into an exit status.
pub fn exit_code<E: Display>(result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
