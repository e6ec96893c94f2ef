use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Serial device related errors.
pub mod error;

/// The device session and the [`session::Device`] seam the watch loop drives.
pub mod session;

/// Raw line settings.
pub(crate) mod termios;

pub use termios::{supported_baud, DEFAULT_BAUD};

/// Bytes read from the line, as text.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Deserialize, Serialize)]
pub struct SerialMessage(String);

impl SerialMessage {
    /// Create a serial message from bytes, ignoring any bad utf8 bytes.
    pub fn new_lossy<B: AsRef<[u8]>>(bytes: B) -> Self {
        Self(String::from_utf8_lossy(bytes.as_ref()).to_string())
    }

    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: AsRef<str>> From<T> for SerialMessage {
    fn from(string_like: T) -> Self {
        Self(string_like.as_ref().into())
    }
}

/// Control characters are shown escaped (`\r`, `\n`, `\u{1b}`),
/// so a record shows everything that was read on one line.
impl Display for SerialMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in self.0.chars() {
            if c.is_control() {
                write!(f, "{}", c.escape_default())?;
            } else {
                write!(f, "{c}")?;
            }
        }

        Ok(())
    }
}
