use std::{fmt::Display, io, path::PathBuf};

use thiserror::Error;

/// A step in putting the line into raw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureStep {
    /// Reading the current terminal attributes.
    GetAttributes,

    /// Setting the line speed.
    SetSpeed,

    /// Applying the terminal attributes.
    SetAttributes,

    /// Reading the descriptor's status flags.
    GetFlags,

    /// Clearing the non-blocking flag.
    SetFlags,
}

impl Display for ConfigureStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            ConfigureStep::GetAttributes => "get termios",
            ConfigureStep::SetSpeed => "set speed",
            ConfigureStep::SetAttributes => "set termios",
            ConfigureStep::GetFlags => "fcntl(F_GETFL)",
            ConfigureStep::SetFlags => "fcntl(F_SETFL)",
        };

        write!(f, "{step}")
    }
}

/// Device failures.
/// The line is in an unknown state after any of these, so they are all fatal.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device node could not be opened.
    #[error("Unable to open `{path}`")]
    Open {
        /// The device node.
        path: PathBuf,
        /// The underlying problem.
        source: io::Error,
    },

    /// A step of the line configuration failed.
    #[error("Unable to {step}")]
    Configure {
        /// Which step.
        step: ConfigureStep,
        /// The underlying problem.
        source: nix::Error,
    },

    /// The requested line speed is not one we know how to set.
    #[error("Unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// Waiting for input failed.
    #[error("poll failed")]
    Poll(#[source] nix::Error),

    /// The device reported a hang-up or error condition instead of data.
    #[error("Device hung up")]
    Hangup,

    /// Writing failed.
    #[error("Write failed")]
    Write(#[source] io::Error),

    /// Not everything was written in one go.
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes actually written.
        written: usize,
        /// Bytes that should have been written.
        expected: usize,
    },

    /// Reading failed.
    #[error("Read failed")]
    Read(#[source] io::Error),

    /// Reads and writes need the configured line.
    #[error("The device has not been configured")]
    NotConfigured,
}
