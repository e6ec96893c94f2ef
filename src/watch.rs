use std::time::Duration;

use tracing::{debug, error, info};

use crate::{
    error::Error,
    line::LineId,
    lock::{Acquisition, AdvisoryLock, LockToken},
    script::InitScript,
    serial::{error::DeviceError, session::Device, SerialMessage},
};

/// How long to leave the device alone after sending a command,
/// or after finding the lock taken.
pub const PAUSE: Duration = Duration::from_secs(1);

/// The most bytes logged per read.
pub const READ_BUFFER_LEN: usize = 1024;

/// Waiting between steps of the loop.
pub trait Pace {
    /// Wait for `duration`.
    fn pause(&mut self, duration: Duration);
}

/// Pacing by sleeping the thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sleep;

impl Pace for Sleep {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Whether the device can be trusted to be set up the way we left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// The device must be reconfigured and the init script (re)sent,
    /// starting at `cursor`.
    /// Only a cursor of zero reconfigures the device.
    NeedsInit {
        /// The next command to send.
        cursor: usize,
    },

    /// The init script has been sent in full during one unbroken run of lock holds.
    Ready,
}

impl MonitorState {
    /// The state everything starts in, and falls back to on contention.
    pub const START: Self = Self::NeedsInit { cursor: 0 };
}

/// What a single step of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// We held the lock for a while.
    Held {
        /// The init command sent, if any.
        sent: Option<usize>,

        /// What was read, if there was input.
        read: Option<SerialMessage>,
    },

    /// Somebody else had the lock.
    Contended,

    /// The lock could not be taken for another reason.
    LockFailed,
}

/// Watches a line, taking turns with other programs that follow the same lock convention.
#[derive(Debug)]
pub struct Watcher<L, D, P> {
    line: LineId,
    lock: L,
    device: D,
    pace: P,
    script: InitScript,
    state: MonitorState,
}

impl<L, D, P> Watcher<L, D, P>
where
    L: AdvisoryLock,
    D: Device,
    P: Pace,
{
    /// Create a watcher which will start by (re)initializing the device.
    pub fn new(line: LineId, lock: L, device: D, pace: P, script: InitScript) -> Self {
        Self {
            line,
            lock,
            device,
            pace,
            script,
            state: MonitorState::START,
        }
    }

    /// The current state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Watch forever.
    /// Only returns on a fatal error.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            self.step()?;
        }
    }

    /// Wait for input if there is nothing to initialize,
    /// then take the lock and do whatever is due.
    pub fn step(&mut self) -> Result<Step, Error> {
        if self.state == MonitorState::Ready {
            debug!("Waiting for input");
            self.device.wait_readable()?;
        }

        match self.lock.acquire(&self.line) {
            Ok(Acquisition::Acquired(token)) => {
                debug!(%token, "Acquired lock");

                let held = self.while_held();
                self.release(&token);

                Ok(held?)
            }
            Ok(Acquisition::InUse { owner }) => {
                debug!(?owner, "Lock in use; sleeping");
                self.pace.pause(PAUSE);

                // Whoever had the line may have changed its settings.
                self.state = MonitorState::START;

                Ok(Step::Contended)
            }
            Err(e) => {
                error!(?e, "Lock error");
                self.pace.pause(PAUSE);

                Ok(Step::LockFailed)
            }
        }
    }

    fn while_held(&mut self) -> Result<Step, DeviceError> {
        let mut sent = None;

        if let MonitorState::NeedsInit { mut cursor } = self.state {
            if cursor == 0 {
                self.device.reconfigure()?;
            }

            if let Some(command) = self.script.get(cursor) {
                debug!(cursor, command = ?String::from_utf8_lossy(command), "Write");
                self.device.send(command)?;

                sent = Some(cursor);
                cursor += 1;

                // Let the device digest the command before the next one.
                self.pace.pause(PAUSE);
            }

            self.state = if cursor >= self.script.len() {
                info!("Initialization done");
                MonitorState::Ready
            } else {
                MonitorState::NeedsInit { cursor }
            };
        }

        let mut read = None;

        if self.device.has_input()? {
            let mut buf = [0u8; READ_BUFFER_LEN];
            let n = self.device.read(&mut buf)?;
            debug!("Read {n} bytes");

            let message = SerialMessage::new_lossy(&buf[..n]);
            info!("{message}");

            read = Some(message);
        }

        Ok(Step::Held { sent, read })
    }

    fn release(&mut self, token: &LockToken) {
        match self.lock.release(&token.line) {
            Ok(()) => debug!("Lock released"),
            Err(e) => error!(?e, "Lock release error"),
        }
    }
}
