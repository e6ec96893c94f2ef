#![allow(dead_code)]

use std::{
    io,
    sync::{Arc, Mutex},
};

use serial_lookout::{
    line::LineId,
    mock::{MockDevice, MockLock, MockPace, Timeline},
    script::InitScript,
    watch::Watcher,
};
use tracing::Level;

pub type MockWatcher = Watcher<MockLock, MockDevice, MockPace>;

/// A watcher wired to mocks, plus handles to poke at them.
pub struct Rig {
    pub timeline: Timeline,
    pub lock: MockLock,
    pub device: MockDevice,
    pub watcher: MockWatcher,
}

pub fn line() -> LineId {
    LineId::new("ttyMock0").expect("Valid line name")
}

/// Set up a watcher with the given (unexpanded) init strings.
pub fn rig(init: &[&str]) -> Rig {
    let timeline = Timeline::new();
    let lock = MockLock::new(&timeline);
    let device = MockDevice::new(&timeline);
    let script = InitScript::from_texts(init).expect("Init strings should expand");

    let watcher = Watcher::new(
        line(),
        lock.clone(),
        device.clone(),
        MockPace::new(&timeline),
        script,
    );

    Rig {
        timeline,
        lock,
        device,
        watcher,
    }
}

/// Log output collected in memory.
#[derive(Debug, Clone, Default)]
pub struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();

        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(Into::into)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with log records at `level` and above going to the returned buffer.
pub fn capture_logs<T>(level: Level, f: impl FnOnce() -> T) -> (T, Captured) {
    let captured = Captured::default();
    let writer = captured.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(level)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    (result, captured)
}
