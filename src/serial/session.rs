use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    os::unix::{fs::OpenOptionsExt, io::AsRawFd},
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::OFlag,
    poll::{poll, PollFd, PollFlags},
    sys::termios::BaudRate,
};
use tracing::{debug, info};

use super::{error::DeviceError, termios};

/// What the watch loop needs from a serial line.
pub trait Device {
    /// Close and reopen the line, then apply the raw line settings.
    fn reconfigure(&mut self) -> Result<(), DeviceError>;

    /// Block until there is input.
    fn wait_readable(&mut self) -> Result<(), DeviceError>;

    /// Check for pending input without blocking.
    fn has_input(&mut self) -> Result<bool, DeviceError>;

    /// Write all of `bytes` with a single call.
    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError>;

    /// A single read into `buf`.
    /// Returns how much was read, which may be less than asked for (or zero).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError>;
}

/// The line as first opened: non-blocking, settings untouched.
/// Only good for waiting on input.
#[derive(Debug)]
pub struct MonitoringPort(File);

/// The line in raw mode with blocking reads.
#[derive(Debug)]
pub struct ConfiguredPort(File);

impl ConfiguredPort {
    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let written = self.0.write(bytes).map_err(DeviceError::Write)?;

        if written == bytes.len() {
            Ok(())
        } else {
            Err(DeviceError::ShortWrite {
                written,
                expected: bytes.len(),
            })
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.0.read(buf).map_err(DeviceError::Read)
    }
}

/// An open line in one of its two modes.
#[derive(Debug)]
pub enum DeviceHandle {
    /// See [`MonitoringPort`].
    Monitoring(MonitoringPort),

    /// See [`ConfiguredPort`].
    Configured(ConfiguredPort),
}

impl DeviceHandle {
    fn file(&self) -> &File {
        match self {
            DeviceHandle::Monitoring(MonitoringPort(file)) => file,
            DeviceHandle::Configured(ConfiguredPort(file)) => file,
        }
    }

    /// True if the raw line settings are in effect.
    pub fn is_configured(&self) -> bool {
        matches!(self, DeviceHandle::Configured(_))
    }
}

/// Ownership of the serial line's descriptor.
#[derive(Debug)]
pub struct DeviceSession {
    path: PathBuf,
    baud: BaudRate,

    // Only empty between closing the old descriptor and opening the new one.
    handle: Option<DeviceHandle>,
}

// Don't wait for carrier, and never become our controlling terminal.
fn open(path: &Path) -> Result<File, DeviceError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags((OFlag::O_NONBLOCK | OFlag::O_NOCTTY).bits())
        .open(path)
        .map_err(|source| DeviceError::Open {
            path: path.into(),
            source,
        })
}

/// Poll for input. A negative timeout waits forever.
fn poll_input(file: &File, timeout: i32) -> Result<PollFlags, DeviceError> {
    loop {
        let mut fds = [PollFd::new(
            file.as_raw_fd(),
            PollFlags::POLLIN | PollFlags::POLLRDNORM | PollFlags::POLLERR,
        )];

        match poll(&mut fds, timeout) {
            Ok(0) => return Ok(PollFlags::empty()),
            Ok(_) => return Ok(fds[0].revents().unwrap_or_else(PollFlags::empty)),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(DeviceError::Poll(e)),
        }
    }
}

fn readable(revents: PollFlags) -> bool {
    revents.intersects(PollFlags::POLLIN | PollFlags::POLLRDNORM)
}

impl DeviceSession {
    /// Open the line for watching, without touching its settings.
    ///
    /// The line speed is only applied later by [`Device::reconfigure`], but is checked here.
    pub fn open_monitoring<P: AsRef<Path>>(path: P, baud: u32) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        let baud = termios::baud_rate(baud)?;
        let file = open(path)?;

        info!(?path, "Monitoring");

        Ok(Self {
            path: path.into(),
            baud,
            handle: Some(DeviceHandle::Monitoring(MonitoringPort(file))),
        })
    }

    /// The current handle.
    pub fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }

    fn file(&self) -> Result<&File, DeviceError> {
        self.handle
            .as_ref()
            .map(DeviceHandle::file)
            .ok_or(DeviceError::NotConfigured)
    }

    fn configured(&mut self) -> Result<&mut ConfiguredPort, DeviceError> {
        match &mut self.handle {
            Some(DeviceHandle::Configured(port)) => Ok(port),
            _ => Err(DeviceError::NotConfigured),
        }
    }
}

impl Device for DeviceSession {
    fn reconfigure(&mut self) -> Result<(), DeviceError> {
        debug!("Recycle fd");

        // Close before reopening so nothing buffered under the old settings survives.
        drop(self.handle.take());

        let file = open(&self.path)?;
        termios::make_raw(file.as_raw_fd(), self.baud)?;

        self.handle = Some(DeviceHandle::Configured(ConfiguredPort(file)));

        Ok(())
    }

    fn wait_readable(&mut self) -> Result<(), DeviceError> {
        loop {
            let revents = poll_input(self.file()?, -1)?;

            if readable(revents) {
                return Ok(());
            }

            // Nothing to read, but poll still returned: it would do so again right away.
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                return Err(DeviceError::Hangup);
            }
        }
    }

    fn has_input(&mut self) -> Result<bool, DeviceError> {
        poll_input(self.file()?, 0).map(readable)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        self.configured()?.send(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.configured()?.read(buf)
    }
}
