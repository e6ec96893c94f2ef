use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{escape::EscapeError, lock::LockError, serial::error::DeviceError};

/// Errors thay may occur in this library.
///
/// Any of these reaching the top of the program is fatal.
/// Lock problems are normally handled within the watch loop and only show up
/// here from one-shot tools.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration (file or command line) is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// An initialization string could not be expanded.
    #[error("Bad initialization string")]
    Escape(#[from] EscapeError),

    /// The serial device failed.
    #[error("Device problem")]
    Device(#[from] DeviceError),

    /// Taking or giving back the lock failed.
    #[error("Lock problem")]
    Lock(#[from] LockError),

    /// The pid file could not be written.
    #[error("Could not write pid file `{path}`")]
    PidFile {
        /// Where the pid file should have been.
        path: PathBuf,

        /// The underlying problem.
        source: io::Error,
    },

    /// Detaching from the terminal failed.
    #[error("Could not run as a daemon")]
    Daemon(#[source] nix::Error),
}

impl Error {
    /// If this is a [`Error::BadConfig`], get the message.
    pub fn try_into_bad_config(self) -> Option<String> {
        if let Self::BadConfig(message) = self {
            Some(message)
        } else {
            None
        }
    }
}
