use std::{
    fmt::Display,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{trace, warn};

use crate::line::LineId;

/// The directory cooperating programs put their lock files in by default.
pub const DEFAULT_LOCK_DIR: &str = "/var/lock";

/// Filesystem failures while taking or giving back a lock.
///
/// None of these mean that someone else holds the lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The per-process lock file could not be created.
    #[error("File creation error for `{path}`")]
    Create {
        /// The file.
        path: PathBuf,
        /// The underlying problem.
        source: io::Error,
    },

    /// The pid could not be written to the per-process lock file.
    #[error("File write error for `{path}`")]
    Write {
        /// The file.
        path: PathBuf,
        /// The underlying problem.
        source: io::Error,
    },

    /// Publishing the per-process lock file under the canonical name failed
    /// for a reason other than the name being taken.
    #[error("File rename error for `{path}`")]
    Rename {
        /// The canonical lock file.
        path: PathBuf,
        /// The underlying problem.
        source: io::Error,
    },

    /// The canonical lock file could not be removed.
    #[error("File removal error for `{path}`")]
    Release {
        /// The canonical lock file.
        path: PathBuf,
        /// The underlying problem.
        source: io::Error,
    },
}

/// Proof that this process holds the lock on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    /// The locked line.
    pub line: LineId,

    /// The process holding it, i.e. us.
    pub pid: u32,
}

impl Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (pid {})", self.line, self.pid)
    }
}

/// The result of trying to take a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// We hold the lock now, and must release it.
    Acquired(LockToken),

    /// Someone else holds the lock.
    InUse {
        /// The pid found in the existing lock file, if it could be read.
        /// Only used for diagnostics.
        owner: Option<u32>,
    },
}

/// A named mutual exclusion token shared between unrelated processes.
///
/// Neither operation blocks or retries; any backoff is up to the caller.
pub trait AdvisoryLock {
    /// Try to take the lock for `line`.
    fn acquire(&mut self, line: &LineId) -> Result<Acquisition, LockError>;

    /// Give back the lock for `line`.
    fn release(&mut self, line: &LineId) -> Result<(), LockError>;
}

/// UUCP style lock files in a shared directory.
///
/// The lock for line `ttyS0` is the file `LCK..ttyS0`, holding the decimal pid
/// of its owner followed by a newline.
/// The lock is only advisory: a program not following the convention is not kept out.
#[derive(Debug, Clone)]
pub struct LockDir {
    dir: PathBuf,
    pid: u32,
}

impl LockDir {
    /// Lock files in `dir`, owned by this process.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self::with_pid(dir, std::process::id())
    }

    /// Lock files in `dir`, owned by the given pid.
    pub fn with_pid<P: Into<PathBuf>>(dir: P, pid: u32) -> Self {
        Self {
            dir: dir.into(),
            pid,
        }
    }

    /// Where the canonical lock file for `line` lives.
    pub fn lock_path(&self, line: &LineId) -> PathBuf {
        self.dir.join(line.lock_file_name())
    }

    fn temp_path(&self, line: &LineId) -> PathBuf {
        self.dir.join(line.temp_lock_file_name(self.pid))
    }

    fn write_temp(&self, temp: &Path) -> Result<(), LockError> {
        // A leftover from an earlier crash of a process with our pid.
        let _ = fs::remove_file(temp);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(temp)
            .map_err(|source| LockError::Create {
                path: temp.into(),
                source,
            })?;

        self.write_pid(file, temp)
    }

    fn write_pid<W: Write>(&self, mut out: W, temp: &Path) -> Result<(), LockError> {
        out.write_all(format!("{}\n", self.pid).as_bytes())
            .map_err(|source| LockError::Write {
                path: temp.into(),
                source,
            })
    }

    /// Publish a freshly written temporary file under the canonical name with `link`,
    /// which must fail with [`io::ErrorKind::AlreadyExists`] if the name is taken.
    /// The temporary file is gone afterwards, whatever the outcome.
    fn acquire_with<F>(&self, line: &LineId, link: F) -> Result<Acquisition, LockError>
    where
        F: FnOnce(&Path, &Path) -> io::Result<()>,
    {
        let temp = self.temp_path(line);
        let canonical = self.lock_path(line);

        let result = self
            .write_temp(&temp)
            .and_then(|()| match link(&temp, &canonical) {
                Ok(()) => Ok(Acquisition::Acquired(LockToken {
                    line: line.clone(),
                    pid: self.pid,
                })),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(Acquisition::InUse {
                    owner: self.owner(line),
                }),
                Err(source) => Err(LockError::Rename {
                    path: canonical.clone(),
                    source,
                }),
            });

        if let Err(e) = fs::remove_file(&temp) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(?temp, ?e, "Could not remove temporary lock file");
            }
        }

        trace!(?canonical, ?result, "Lock attempt");

        result
    }

    /// Read the owner of an existing lock file, if possible.
    pub fn owner(&self, line: &LineId) -> Option<u32> {
        fs::read_to_string(self.lock_path(line))
            .ok()
            .and_then(|contents| contents.trim().parse().ok())
    }
}

impl AdvisoryLock for LockDir {
    fn acquire(&mut self, line: &LineId) -> Result<Acquisition, LockError> {
        // Linking refuses to replace an existing name, and does so atomically.
        // This is what makes the whole scheme work between processes.
        self.acquire_with(line, |temp, canonical| fs::hard_link(temp, canonical))
    }

    fn release(&mut self, line: &LineId) -> Result<(), LockError> {
        let canonical = self.lock_path(line);

        fs::remove_file(&canonical).map_err(|source| LockError::Release {
            path: canonical,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn token_display() {
        let token = LockToken {
            line: LineId::new("ttyUSB1").unwrap(),
            pid: 77,
        };

        assert_eq!(token.to_string(), "ttyUSB1 (pid 77)");
    }

    #[test]
    fn paths_are_in_the_dir() {
        let lock = LockDir::with_pid("/var/lock", 12);
        let line = LineId::new("ttyS0").unwrap();

        assert_eq!(lock.lock_path(&line), PathBuf::from("/var/lock/LCK..ttyS0"));
        assert_eq!(lock.temp_path(&line), PathBuf::from("/var/lock/LCK..ttyS0.12"));
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[test]
    fn link_failure_is_a_rename_error_and_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockDir::with_pid(dir.path(), 31);
        let line = LineId::new("ttyS0").unwrap();

        let err = lock
            .acquire_with(&line, |temp, _| {
                assert!(temp.exists(), "Pid should be written before linking");
                Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "no hard links here",
                ))
            })
            .unwrap_err();

        let (path, source) = match err {
            LockError::Rename { path, source } => (path, source),
            other => panic!("Expected a rename error, got {other:?}"),
        };
        assert_eq!(path, lock.lock_path(&line));
        assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(entries(dir.path()), Vec::<PathBuf>::new());
    }

    #[test]
    fn taken_name_reported_by_link_is_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let lock = LockDir::with_pid(dir.path(), 31);
        let line = LineId::new("ttyS0").unwrap();

        let acquisition = lock
            .acquire_with(&line, |_, _| Err(io::ErrorKind::AlreadyExists.into()))
            .unwrap();

        assert_eq!(acquisition, Acquisition::InUse { owner: None });
        assert_eq!(entries(dir.path()), Vec::<PathBuf>::new());
    }

    /// Accepts nothing, like a full disk.
    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_pid_write_is_a_write_error() {
        let lock = LockDir::with_pid("/var/lock", 31);
        let temp = PathBuf::from("/var/lock/LCK..ttyS0.31");

        let err = lock.write_pid(Full, &temp).unwrap_err();

        let (path, source) = match err {
            LockError::Write { path, source } => (path, source),
            other => panic!("Expected a write error, got {other:?}"),
        };
        assert_eq!(path, temp);
        assert_eq!(source.kind(), io::ErrorKind::WriteZero);
    }
}
