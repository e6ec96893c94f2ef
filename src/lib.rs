#![deny(missing_docs)]

//! This crate unobtrusively logs data coming in on a serial line.
//!
//! The line may be shared with other programs, such as a dialer.
//! Before touching the device, a UUCP style lock file is taken,
//! so cooperating programs take turns instead of stepping on each other.
//!
//! Optionally, initialization strings are sent to the device before watching starts.
//! They are sent exactly once, in order, with a pause between each,
//! and are sent again from the start whenever someone else has had the line.
//!
//! Every chunk of input seen is logged.

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Expanding backslash escapes in initialization strings.
pub mod escape;

/// Names of lines, and the files derived from them.
pub mod line;

/// Advisory lock files shared between unrelated processes.
pub mod lock;

/// Logging/tracing setup.
pub mod logging;

/// Mocked device, lock and pacing for exercising the watch loop.
pub mod mock;

/// Daemonizing and the pid file.
pub mod process;

/// The commands sent to initialize a device.
pub mod script;

/// Serial device driver.
pub mod serial;

/// The loop deciding when to touch the device.
pub mod watch;
