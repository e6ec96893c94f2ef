use std::os::unix::io::RawFd;

use nix::{
    fcntl::{fcntl, FcntlArg, OFlag},
    sys::termios::{
        cfsetspeed, tcgetattr, tcsetattr, BaudRate, ControlFlags, InputFlags, LocalFlags,
        OutputFlags, SetArg,
    },
};

use super::error::{ConfigureStep, DeviceError};

/// The line speed used unless configured otherwise.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Map a numeric line speed to the termios constant.
pub(crate) fn baud_rate(baud: u32) -> Result<BaudRate, DeviceError> {
    let rate = match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19_200 => BaudRate::B19200,
        38_400 => BaudRate::B38400,
        57_600 => BaudRate::B57600,
        115_200 => BaudRate::B115200,
        230_400 => BaudRate::B230400,
        other => return Err(DeviceError::UnsupportedBaud(other)),
    };

    Ok(rate)
}

/// True if the line speed can be set.
pub fn supported_baud(baud: u32) -> bool {
    baud_rate(baud).is_ok()
}

fn step(step: ConfigureStep) -> impl FnOnce(nix::Error) -> DeviceError {
    move |source| DeviceError::Configure { step, source }
}

/// Put the line into raw 8-bit mode at the given speed, and make reads block.
///
/// Reads only happen after poll said there is input,
/// so a blocking descriptor never waits in practice, but it also never spuriously returns nothing.
pub(crate) fn make_raw(fd: RawFd, baud: BaudRate) -> Result<(), DeviceError> {
    let mut tio = tcgetattr(fd).map_err(step(ConfigureStep::GetAttributes))?;

    tio.input_flags.insert(InputFlags::IGNBRK);
    tio.input_flags
        .remove(InputFlags::ICRNL | InputFlags::IMAXBEL | InputFlags::IXON | InputFlags::BRKINT);

    tio.output_flags
        .remove(OutputFlags::OPOST | OutputFlags::ONLCR);

    tio.control_flags.insert(ControlFlags::CS8);
    tio.control_flags.remove(ControlFlags::CRTSCTS);

    tio.local_flags.insert(LocalFlags::NOFLSH);
    tio.local_flags.remove(
        LocalFlags::ISIG
            | LocalFlags::ICANON
            | LocalFlags::IEXTEN
            | LocalFlags::ECHO
            | LocalFlags::ECHOE
            | LocalFlags::ECHOK
            | LocalFlags::ECHOCTL
            | LocalFlags::ECHOKE,
    );

    cfsetspeed(&mut tio, baud).map_err(step(ConfigureStep::SetSpeed))?;
    tcsetattr(fd, SetArg::TCSAFLUSH, &tio).map_err(step(ConfigureStep::SetAttributes))?;

    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(step(ConfigureStep::GetFlags))?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.remove(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(step(ConfigureStep::SetFlags))?;

    Ok(())
}
