use std::{path::PathBuf, time::Duration};

use clap::Parser;
use color_eyre::Result;
use serial_lookout::{
    line::LineId,
    lock::{Acquisition, AdvisoryLock, LockDir, DEFAULT_LOCK_DIR},
    logging::{self, LogSettings},
};
use tracing::{info, Level};

/// Take the lock on a line for a while, the way a dialer would.
/// Useful to see a watcher back off and reinitialize.
#[derive(Parser)]
struct Args {
    /// The line to lock, e.g. `ttyACM0`.
    line: String,

    /// How long to hold the lock.
    #[arg(short, long, default_value_t = 10)]
    seconds: u64,

    /// Directory with lock files.
    #[arg(long, default_value = DEFAULT_LOCK_DIR)]
    lock_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let guard = logging::init(LogSettings::stdout(Level::DEBUG)).await;

    let line = LineId::new(&args.line)?;
    let mut lock = LockDir::new(args.lock_dir);

    match lock.acquire(&line)? {
        Acquisition::Acquired(token) => {
            info!(%token, seconds = args.seconds, "Holding lock");
            tokio::time::sleep(Duration::from_secs(args.seconds)).await;

            lock.release(&line)?;
            info!("Released");
        }
        Acquisition::InUse { owner } => {
            info!(?owner, "Lock already held");
        }
    }

    logging::shutdown(guard);

    Ok(())
}
