use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::Level;

use crate::{config::Config, error::Error, line::LineId, script::InitScript};

/// The command line interface for serial lookout.
///
/// Example: `serial-lookout ttyACM0 'ATS82=76\r\n'`
#[derive(Parser, Debug)]
#[command(author, version, about, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// The line to watch, e.g. `ttyACM0`.
    pub line: Option<String>,

    /// Initialization strings sent in order before watching.
    /// Backslash escapes (`\r`, `\n`, `\t`, `\\`, ...) are expanded.
    pub init: Vec<String>,

    /// Path to a configuration file.
    /// Arguments given here take precedence over it.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Line speed.
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Directory with lock files shared with other programs.
    #[arg(long)]
    pub lock_dir: Option<PathBuf>,

    /// Directory the pid file is written to.
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Directory with device nodes.
    #[arg(long)]
    pub device_dir: Option<PathBuf>,

    /// Detach and run in the background.
    /// Logs then only go to the log directory, so one must be given.
    #[arg(short, long, requires = "log_dir")]
    pub daemon: bool,

    /// Log level.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Directory for daily rolling log files.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),

    /// List the serial ports the system knows about.
    Ports,
}

/// Helpful examples for users.
#[derive(Subcommand, Clone, Debug)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,
}

impl Cli {
    /// The configuration file (or the defaults), overridden by arguments.
    pub fn config(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::new_from_path(path)?,
            None => Config::default(),
        };

        if let Some(line) = &self.line {
            config.line = Some(line.clone());
        }

        if !self.init.is_empty() {
            config.init = self.init.clone();
        }

        if let Some(baud) = self.baud {
            config.baud = baud;
        }

        if let Some(dir) = &self.lock_dir {
            config.lock_dir = dir.clone();
        }

        if let Some(dir) = &self.run_dir {
            config.run_dir = dir.clone();
        }

        if let Some(dir) = &self.device_dir {
            config.device_dir = dir.clone();
        }

        config.validate()?;

        Ok(config)
    }
}

/// Everything needed to start watching, resolved and checked up front.
///
/// Directories are absolute, since detaching changes the working directory.
#[derive(Debug)]
pub struct Startup {
    /// The merged configuration.
    pub config: Config,

    /// The line to watch.
    pub line: LineId,

    /// The expanded init strings.
    pub script: InitScript,

    /// Where log files go, if anywhere.
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    /// Resolve the configuration against the current working directory.
    pub fn startup(&self) -> Result<Startup, Error> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::BadConfig(format!("No working directory: {e}")))?;

        self.startup_in(&cwd)
    }

    fn startup_in(&self, cwd: &Path) -> Result<Startup, Error> {
        let config = self.config()?.anchored(cwd);

        Ok(Startup {
            line: config.line_id()?,
            script: config.init_script()?,
            log_dir: self.log_dir.as_ref().map(|dir| cwd.join(dir)),
            config,
        })
    }
}

fn list_ports() -> Result<String, Error> {
    let ports = serialport::available_ports()
        .map_err(|e| Error::BadConfig(format!("Could not list serial ports: {e}")))?;

    if ports.is_empty() {
        return Ok("No serial ports found".into());
    }

    Ok(ports
        .iter()
        .map(|port| match &port.port_type {
            serialport::SerialPortType::UsbPort(usb) => format!(
                "{} (usb {:04x}:{:04x}{})",
                port.port_name,
                usb.vid,
                usb.pid,
                usb.product
                    .as_ref()
                    .map(|product| format!(", {product}"))
                    .unwrap_or_default()
            ),
            other => format!("{} ({other:?})", port.port_name),
        })
        .join("\n"))
}

/// Run a subcommand, printing its output.
pub fn handle_command(command: Commands) -> Result<(), Error> {
    match command {
        Commands::Examples(Examples::Config) => {
            println!("{}", Config::example().serialize_pretty()?);
        }
        Commands::Ports => {
            println!("{}", list_ports()?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }

    #[test]
    fn line_and_init_strings() {
        let cli = Cli::parse_from(["serial-lookout", "ttyACM0", r"ATZ\r\n", r"ATS82=76\r\n"]);
        let config = cli.config().unwrap();

        assert_eq!(config.line.as_deref(), Some("ttyACM0"));
        assert_eq!(config.init, vec![r"ATZ\r\n", r"ATS82=76\r\n"]);
        assert_eq!(config.baud, 115_200);
    }

    #[test]
    fn arguments_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lookout.ron");
        std::fs::write(&path, r#"(line: "ttyS0", init: ["ATZ"], baud: 9600)"#).unwrap();

        let cli = Cli::parse_from([
            "serial-lookout",
            "--config",
            path.to_str().unwrap(),
            "--baud",
            "57600",
            "ttyS1",
        ]);
        let config = cli.config().unwrap();

        assert_eq!(config.line.as_deref(), Some("ttyS1"));
        // Not given on the command line, so from the file
        assert_eq!(config.init, vec!["ATZ"]);
        assert_eq!(config.baud, 57_600);
    }

    #[test]
    fn missing_line_is_bad() {
        let cli = Cli::parse_from(["serial-lookout"]);

        assert!(matches!(cli.config(), Err(Error::BadConfig(_))));
    }

    #[test]
    fn daemon_needs_a_log_dir() {
        let err = Cli::try_parse_from(["serial-lookout", "--daemon", "ttyS0"]).unwrap_err();

        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["serial-lookout", "-d", "--log-dir", "logs", "ttyS0"])
            .unwrap();
        assert!(cli.daemon);
    }

    #[test]
    fn startup_rejects_bad_configuration() {
        for args in [
            vec!["serial-lookout", "-d", "--log-dir", "logs"],
            vec!["serial-lookout", "-d", "--log-dir", "logs", "ttyS0", r"AT\q"],
            vec!["serial-lookout", "-d", "--log-dir", "logs", "-b", "1234", "ttyS0"],
        ] {
            let cli = Cli::parse_from(&args);

            assert!(
                matches!(cli.startup(), Err(Error::BadConfig(_) | Error::Escape(_))),
                "{args:?}"
            );
        }
    }

    #[test]
    fn startup_makes_directories_absolute() {
        let cli = Cli::parse_from([
            "serial-lookout",
            "--lock-dir",
            "locks",
            "--run-dir",
            "/run",
            "--log-dir",
            "logs",
            "ttyS0",
            r"ATZ\r",
        ]);

        let startup = cli.startup_in(Path::new("/home/lookout")).unwrap();

        assert_eq!(startup.line, LineId::new("ttyS0").unwrap());
        assert_eq!(startup.script.len(), 1);
        assert_eq!(startup.config.lock_dir, PathBuf::from("/home/lookout/locks"));
        assert_eq!(startup.config.run_dir, PathBuf::from("/run"));
        assert_eq!(startup.config.device_dir, PathBuf::from("/dev"));
        assert_eq!(startup.log_dir, Some(PathBuf::from("/home/lookout/logs")));
    }

    #[test]
    fn subcommand() {
        let cli = Cli::parse_from(["serial-lookout", "examples", "config"]);

        assert!(matches!(
            cli.command,
            Some(Commands::Examples(Examples::Config))
        ));
    }
}
