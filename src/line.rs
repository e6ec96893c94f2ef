use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The name of a serial line, such as `ttyACM0` or `cuaU0`.
///
/// Every file this program touches on behalf of a line is derived from it,
/// so cooperating programs must agree on the exact spelling.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct LineId(String);

impl LineId {
    /// Create a line id.
    /// The name must be non-empty and must not contain a path separator,
    /// since it is used as a file name component.
    pub fn new<S: AsRef<str>>(name: S) -> Result<Self, Error> {
        let name = name.as_ref();

        if name.is_empty() {
            return Err(Error::BadConfig("The line name is empty".into()));
        }

        if name.contains('/') {
            return Err(Error::BadConfig(format!(
                "The line name `{name}` contains a `/`. Give the name relative to the device directory, e.g. `ttyACM0` instead of `/dev/ttyACM0`."
            )));
        }

        Ok(Self(name.into()))
    }

    /// Borrowed form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The device node for this line within `device_dir`.
    pub fn device_path<P: AsRef<Path>>(&self, device_dir: P) -> PathBuf {
        device_dir.as_ref().join(&self.0)
    }

    /// The canonical lock file name, `LCK..<line>`.
    pub fn lock_file_name(&self) -> String {
        format!("LCK..{}", self.0)
    }

    /// The per-process lock file name used while acquiring, `LCK..<line>.<pid>`.
    pub fn temp_lock_file_name(&self, pid: u32) -> String {
        format!("LCK..{}.{pid}", self.0)
    }

    /// The file recording the pid of the watcher for this line.
    pub fn pid_file_name(&self) -> String {
        format!("serial-lookout.{}.pid", self.0)
    }
}

impl Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn derived_names() {
        let id = LineId::new("ttyACM0").unwrap();

        assert_eq!(id.device_path("/dev"), PathBuf::from("/dev/ttyACM0"));
        assert_eq!(id.lock_file_name(), "LCK..ttyACM0");
        assert_eq!(id.temp_lock_file_name(4321), "LCK..ttyACM0.4321");
        assert_eq!(id.pid_file_name(), "serial-lookout.ttyACM0.pid");
    }

    #[test]
    fn empty_is_bad() {
        assert!(matches!(LineId::new(""), Err(Error::BadConfig(_))));
    }

    #[test]
    fn full_path_is_bad() {
        let err = LineId::new("/dev/ttyS0").unwrap_err().try_into_bad_config().unwrap();

        // The message should point the user at the fix.
        assert!(err.contains("ttyACM0"));
    }
}
