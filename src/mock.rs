//! Mocks, useful to test the watch loop without actual serial ports or lock directories.
//!
//! The mocks are cheap to clone; clones share state, so a test can keep a clone
//! to feed input or script lock outcomes while the watcher owns the other one.
//! Everything the mocks are asked to do is recorded on a shared [`Timeline`].

use std::{
    collections::VecDeque,
    io,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tracing::trace;

use crate::{
    line::LineId,
    lock::{Acquisition, AdvisoryLock, LockError, LockToken},
    serial::{error::DeviceError, session::Device},
    watch::Pace,
};

/// Something a mock was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// The lock was taken.
    Acquired,
    /// The lock was found taken by someone else.
    InUse,
    /// Taking the lock failed.
    LockFailed,
    /// The lock was given back.
    Released,
    /// The device was reopened and configured.
    Reconfigured,
    /// The loop blocked waiting for input.
    Waited,
    /// Bytes were written to the device.
    Sent(Vec<u8>),
    /// Bytes were read from the device.
    Read(Vec<u8>),
    /// The loop paused.
    Paused(Duration),
}

/// A shared, ordered record of [`MockEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct Timeline(Arc<Mutex<Vec<MockEvent>>>);

impl Timeline {
    /// A new, empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: MockEvent) {
        trace!(?event, "Mock event");
        self.0.lock().expect("Timeline lock poisoned").push(event);
    }

    /// Everything recorded so far.
    pub fn events(&self) -> Vec<MockEvent> {
        self.0.lock().expect("Timeline lock poisoned").clone()
    }

    /// Everything sent to the device so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MockEvent::Sent(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    /// How many times `event` was recorded.
    pub fn count(&self, event: &MockEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.0.lock().expect("Timeline lock poisoned").clear();
    }
}

/// How the mock lock answers an acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Hand out the lock.
    Grant,
    /// Pretend a peer holds it.
    Busy,
    /// Pretend the filesystem failed.
    Fail,
}

#[derive(Debug, Default)]
struct LockState {
    script: VecDeque<LockOutcome>,
    held: bool,
}

/// A lock which grants every request unless told otherwise.
#[derive(Debug, Clone)]
pub struct MockLock {
    timeline: Timeline,
    state: Arc<Mutex<LockState>>,
}

impl MockLock {
    /// A lock recording to `timeline`.
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().expect("Mock lock poisoned")
    }

    /// Answer the next acquires with these outcomes, in order.
    /// Once used up, acquires are granted again.
    pub fn script<I: IntoIterator<Item = LockOutcome>>(&self, outcomes: I) {
        self.state().script.extend(outcomes);
    }

    /// True if the lock is currently handed out.
    pub fn is_held(&self) -> bool {
        self.state().held
    }
}

impl AdvisoryLock for MockLock {
    fn acquire(&mut self, line: &LineId) -> Result<Acquisition, LockError> {
        let mut state = self.state();

        let outcome = if state.held {
            LockOutcome::Busy
        } else {
            state.script.pop_front().unwrap_or(LockOutcome::Grant)
        };

        match outcome {
            LockOutcome::Grant => {
                state.held = true;
                self.timeline.push(MockEvent::Acquired);

                Ok(Acquisition::Acquired(LockToken {
                    line: line.clone(),
                    pid: std::process::id(),
                }))
            }
            LockOutcome::Busy => {
                self.timeline.push(MockEvent::InUse);

                Ok(Acquisition::InUse { owner: None })
            }
            LockOutcome::Fail => {
                self.timeline.push(MockEvent::LockFailed);

                Err(LockError::Create {
                    path: PathBuf::from(line.temp_lock_file_name(std::process::id())),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "mock failure"),
                })
            }
        }
    }

    fn release(&mut self, line: &LineId) -> Result<(), LockError> {
        let mut state = self.state();

        if !state.held {
            return Err(LockError::Release {
                path: PathBuf::from(line.lock_file_name()),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }

        state.held = false;
        self.timeline.push(MockEvent::Released);

        Ok(())
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    configured: bool,
    pending: VecDeque<Vec<u8>>,
    failing_writes: bool,
}

/// A serial line fed by the test.
///
/// Waiting for input when none is queued fails with [`DeviceError::Hangup`],
/// so a test can never block forever.
#[derive(Debug, Clone)]
pub struct MockDevice {
    timeline: Timeline,
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// A device recording to `timeline`.
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().expect("Mock device poisoned")
    }

    /// Queue bytes as arriving on the line.
    /// Each call is returned by a separate read.
    pub fn push_input<B: AsRef<[u8]>>(&self, bytes: B) {
        self.state().pending.push_back(bytes.as_ref().to_vec());
    }

    /// Make every following write fail.
    pub fn fail_writes(&self) {
        self.state().failing_writes = true;
    }
}

impl Device for MockDevice {
    fn reconfigure(&mut self) -> Result<(), DeviceError> {
        self.state().configured = true;
        self.timeline.push(MockEvent::Reconfigured);

        Ok(())
    }

    fn wait_readable(&mut self) -> Result<(), DeviceError> {
        self.timeline.push(MockEvent::Waited);

        if self.state().pending.is_empty() {
            Err(DeviceError::Hangup)
        } else {
            Ok(())
        }
    }

    fn has_input(&mut self) -> Result<bool, DeviceError> {
        Ok(!self.state().pending.is_empty())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let state = self.state();

        if !state.configured {
            return Err(DeviceError::NotConfigured);
        }

        if state.failing_writes {
            return Err(DeviceError::ShortWrite {
                written: 0,
                expected: bytes.len(),
            });
        }

        self.timeline.push(MockEvent::Sent(bytes.to_vec()));

        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        let mut state = self.state();

        if !state.configured {
            return Err(DeviceError::NotConfigured);
        }

        let Some(mut chunk) = state.pending.pop_front() else {
            return Ok(0);
        };

        // Whatever does not fit stays for the next read.
        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            state.pending.push_front(rest);
        }

        buf[..chunk.len()].copy_from_slice(&chunk);
        self.timeline.push(MockEvent::Read(chunk.clone()));

        Ok(chunk.len())
    }
}

/// Pacing which returns at once, only recording the pause.
#[derive(Debug, Clone)]
pub struct MockPace {
    timeline: Timeline,
}

impl MockPace {
    /// Pacing recording to `timeline`.
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
        }
    }
}

impl Pace for MockPace {
    fn pause(&mut self, duration: Duration) {
        self.timeline.push(MockEvent::Paused(duration));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn line() -> LineId {
        LineId::new("ttyMock0").unwrap()
    }

    #[test]
    fn lock_is_exclusive() {
        let timeline = Timeline::new();
        let mut lock = MockLock::new(&timeline);

        assert!(matches!(
            lock.acquire(&line()),
            Ok(Acquisition::Acquired(_))
        ));
        assert!(matches!(
            lock.acquire(&line()),
            Ok(Acquisition::InUse { .. })
        ));

        lock.release(&line()).unwrap();
        assert!(!lock.is_held());

        assert_eq!(
            timeline.events(),
            vec![MockEvent::Acquired, MockEvent::InUse, MockEvent::Released]
        );
    }

    #[test]
    fn lock_follows_script() {
        let timeline = Timeline::new();
        let mut lock = MockLock::new(&timeline);
        lock.script([LockOutcome::Fail, LockOutcome::Busy]);

        assert!(lock.acquire(&line()).is_err());
        assert!(matches!(
            lock.acquire(&line()),
            Ok(Acquisition::InUse { owner: None })
        ));
        assert!(matches!(
            lock.acquire(&line()),
            Ok(Acquisition::Acquired(_))
        ));
    }

    #[test]
    fn releasing_unheld_lock_fails() {
        let mut lock = MockLock::new(&Timeline::new());

        assert!(matches!(
            lock.release(&line()),
            Err(LockError::Release { .. })
        ));
    }

    #[test]
    fn device_reads_split_long_input() {
        let timeline = Timeline::new();
        let mut device = MockDevice::new(&timeline);
        device.reconfigure().unwrap();
        device.push_input("RING\r\n");

        let mut buf = [0u8; 4];
        assert_eq!(device.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"RING");

        assert!(device.has_input().unwrap());
        assert_eq!(device.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"\r\n");

        assert!(!device.has_input().unwrap());
    }

    #[test]
    fn device_needs_configuring_before_writes() {
        let mut device = MockDevice::new(&Timeline::new());

        assert!(matches!(
            device.send(b"ATZ"),
            Err(DeviceError::NotConfigured)
        ));
    }
}
