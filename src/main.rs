use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use serial_lookout::{
    cli::{self, Startup},
    lock::LockDir,
    logging::{self, LogSettings},
    process,
    serial::session::DeviceSession,
    watch::{Sleep, Watcher},
};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, info_span};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let mut cli = cli::Cli::parse();

    if let Some(command) = cli.command.take() {
        cli::handle_command(command)?;

        return Ok(ExitCode::SUCCESS);
    }

    // Once detached, the exit status and the terminal are gone.
    let startup = cli.startup()?;

    // Forking is only safe before any threads exist.
    if cli.daemon {
        process::daemonize()?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let code = runtime.block_on(run(cli, startup));

    // The watch loop may be blocked waiting for input; don't wait for it.
    runtime.shutdown_background();

    Ok(code)
}

async fn run(cli: cli::Cli, startup: Startup) -> ExitCode {
    let guard = logging::init(LogSettings {
        stdout: (!cli.daemon).then_some(cli.log_level),
        file: startup.log_dir.clone().map(|dir| (cli.log_level, dir)),
        file_name: format!("serial-lookout.{}.log", startup.line),
    })
    .await;

    let code = process::exit_code(watch(startup).await);

    logging::shutdown(guard);

    code
}

async fn watch(startup: Startup) -> Result<()> {
    let Startup {
        config,
        line,
        script,
        ..
    } = startup;
    let span = info_span!("lookout", %line);

    let mut watcher = span.in_scope(|| -> Result<_> {
        info!(pid = std::process::id(), "Starting up");

        process::write_pid_file(&config.run_dir, &line)?;

        let device =
            DeviceSession::open_monitoring(line.device_path(&config.device_dir), config.baud)?;

        Ok(Watcher::new(
            line.clone(),
            LockDir::new(&config.lock_dir),
            device,
            Sleep,
            script,
        ))
    })?;

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let mut watching = tokio::task::spawn_blocking(move || span.in_scope(|| watcher.run()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(%line, "Ctrl-C, quitting")
        }
        _ = hangup.recv() => {
            info!(%line, "Told to hang up, quitting")
        }
        _ = terminate.recv() => {
            info!(%line, "Terminated, quitting")
        }
        result = &mut watching => {
            result??;
            return Err(color_eyre::eyre::eyre!("Watching stopped unexpectedly"));
        }
    }

    Ok(())
}
