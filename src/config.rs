use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    line::LineId,
    lock::DEFAULT_LOCK_DIR,
    script::InitScript,
    serial::{supported_baud, DEFAULT_BAUD},
};

/// The configuration used for watching a line.
///
/// Every field may be omitted from a configuration file.
/// Command line arguments take precedence over the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The line to watch, relative to [`Config::device_dir`].
    /// Required, either here or on the command line.
    pub line: Option<String>,

    /// Strings sent to the device, in order, before watching.
    /// Backslash escapes such as `\r` and `\n` are expanded.
    pub init: Vec<String>,

    /// Line speed applied when the device is configured.
    pub baud: u32,

    /// Where device nodes live.
    pub device_dir: PathBuf,

    /// Where lock files shared with other programs live.
    pub lock_dir: PathBuf,

    /// Where the pid file is written.
    pub run_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            line: None,
            init: vec![],
            baud: DEFAULT_BAUD,
            device_dir: PathBuf::from("/dev"),
            lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
            run_dir: PathBuf::from("/var/run"),
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        Self::ron()
            .from_str::<Config>(input)
            .map_err(|e| Error::BadConfig(format!("Not a valid configuration: {e}")))
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            line: Some("ttyACM0".into()),
            init: vec![r"ATZ\r\n".into(), r"ATS82=76\r\n".into()],
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> Result<String, Error> {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::BadConfig(format!("Could not serialize configuration: {e}")))
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        let p = p.as_ref();
        let s = std::fs::read_to_string(p)
            .map_err(|e| Error::BadConfig(format!("Could not read {p:?}: {e}")))?;

        Self::deserialize(&s)
    }

    /// The line to watch.
    pub fn line_id(&self) -> Result<LineId, Error> {
        let line = self.line.as_ref().ok_or_else(|| {
            Error::BadConfig("No line given. Name one, e.g. `ttyACM0`.".into())
        })?;

        LineId::new(line)
    }

    /// The init strings, expanded.
    pub fn init_script(&self) -> Result<InitScript, Error> {
        Ok(InitScript::from_texts(&self.init)?)
    }

    fn check_baud(&self) -> Result<(), Error> {
        if supported_baud(self.baud) {
            Ok(())
        } else {
            Err(Error::BadConfig(format!(
                "The baud rate {} is not supported. Use one of 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200 or 230400.",
                self.baud
            )))
        }
    }

    /// Relative directories taken as relative to `cwd`.
    pub fn anchored(mut self, cwd: &Path) -> Self {
        for dir in [&mut self.device_dir, &mut self.lock_dir, &mut self.run_dir] {
            *dir = cwd.join(&*dir);
        }

        self
    }

    /// Check everything needed to start watching is present and sensible.
    pub fn validate(&self) -> Result<(), Error> {
        self.line_id()?;
        self.init_script()?;
        self.check_baud()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::escape::EscapeError;

    #[test]
    fn serialize() {
        let c = Config::example();

        println!("{}", c.serialize_pretty().unwrap());
    }

    #[test]
    fn example_roundtrips() {
        let c = Config::example();
        let serialized = c.serialize_pretty().unwrap();

        assert_eq!(Config::deserialize(&serialized).unwrap(), c);
    }

    #[test]
    fn deserialize() {
        let input = r#"
(
    line: "ttyUSB0",
    init: [
        "ATZ\\r\\n",
        "ATE0\\r\\n",
    ],
    baud: 9600,
    lock_dir: "/run/lock",
)
"#;
        let config = Config::deserialize(input).unwrap();

        assert_eq!(config.line.as_deref(), Some("ttyUSB0"));
        assert_eq!(config.init, vec![r"ATZ\r\n", r"ATE0\r\n"]);
        assert_eq!(config.baud, 9600);
        assert_eq!(config.lock_dir, PathBuf::from("/run/lock"));

        // Not given, so defaulted
        assert_eq!(config.device_dir, PathBuf::from("/dev"));

        config.validate().unwrap();
    }

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(Config::deserialize("()").unwrap(), Config::default());
    }

    #[test]
    fn garbage_is_bad_config() {
        let err = Config::deserialize("(line: 3)").unwrap_err();

        assert!(err.try_into_bad_config().is_some());
    }

    #[test]
    fn missing_line() {
        let err = Config::default().validate().unwrap_err();

        assert!(err.try_into_bad_config().unwrap().contains("No line"));
    }

    #[test]
    fn bad_escape() {
        let c = Config {
            init: vec![r"AT\z".into()],
            ..Config::example()
        };

        assert!(matches!(
            c.validate(),
            Err(Error::Escape(EscapeError::Unknown { escape: 'z', .. }))
        ));
    }

    #[test]
    fn bad_baud() {
        let c = Config {
            baud: 1_000_000,
            ..Config::example()
        };

        let err = c.validate().unwrap_err().try_into_bad_config().unwrap();

        assert!(err.contains("1000000"));
    }
}
