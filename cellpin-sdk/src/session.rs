// ABOUTME: Terminal session guard owning the control channel and its line discipline
// ABOUTME: Saves termios on acquire, restores it on drop, exit, and termination signals

use crate::channel::TtyChannel;
use crate::constants::timeouts;
use crate::error::{Error, Result};
use crate::response;
use log::{debug, warn};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use std::fs::File;
use std::io::{self, Read, Write};
use std::mem::ManuallyDrop;
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Mutex, MutexGuard, Once};
use std::time::Duration;

/// Signals that end the process after the terminal has been restored
const TERMINATION_SIGNALS: [libc::c_int; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

#[cfg(target_os = "linux")]
const CONTROL_DISABLED: libc::cc_t = 0;
#[cfg(not(target_os = "linux"))]
const CONTROL_DISABLED: libc::cc_t = 0xff;

struct SavedTerminal {
    fd: RawFd,
    settings: libc::termios,
    drain_timeout: Duration,
}

/// Settings to put back, present exactly while a session holds the terminal.
static SAVED_TERMINAL: Mutex<Option<SavedTerminal>> = Mutex::new(None);

static EXIT_HOOKS: Once = Once::new();

fn saved_terminal() -> MutexGuard<'static, Option<SavedTerminal>> {
    SAVED_TERMINAL
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive control of the terminal for the duration of one exchange.
///
/// Echo, canonical line buffering, and the suspend key are disabled while the
/// session is held, so protocol responses never show up on screen and a stray
/// Ctrl-Z cannot stop the process in the middle of a transfer.
pub struct TerminalSession<F = File>
where
    F: Read + Write + AsRawFd,
{
    channel: TtyChannel<F>,
    drain_timeout: Duration,
    released: bool,
}

impl TerminalSession<File> {
    /// Take over the controlling terminal
    pub fn acquire() -> Result<Self> {
        let channel = TtyChannel::open().map_err(Error::TerminalAcquisition)?;
        Self::acquire_on(channel, timeouts::DRAIN_TIMEOUT)
    }
}

impl<F> TerminalSession<F>
where
    F: Read + Write + AsRawFd,
{
    /// Take over the terminal behind `channel`
    pub fn acquire_on(channel: TtyChannel<F>, drain_timeout: Duration) -> Result<Self> {
        let fd = channel.as_raw_fd();
        let original = read_settings(fd).map_err(Error::TerminalAcquisition)?;

        {
            let mut saved = saved_terminal();
            if saved.is_some() {
                return Err(Error::TerminalAcquisition(io::Error::other(
                    "another terminal session is already active",
                )));
            }

            // Record before changing anything so every exit path can undo it
            *saved = Some(SavedTerminal {
                fd,
                settings: original,
                drain_timeout,
            });

            if let Err(e) = write_settings(fd, &quiet_settings(&original)) {
                *saved = None;
                return Err(Error::TerminalAcquisition(e));
            }
        }

        install_exit_hooks();
        debug!("acquired terminal on fd {}", fd);

        Ok(Self {
            channel,
            drain_timeout,
            released: false,
        })
    }

    pub fn channel(&mut self) -> &mut TtyChannel<F> {
        &mut self.channel
    }

    /// Drain unread responses and restore the saved settings.
    ///
    /// Safe to call any number of times; returns the number of stray frames
    /// discarded by this call.
    pub fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;

        let drained = response::drain(&mut self.channel, self.drain_timeout);
        if drained > 0 {
            debug!("discarded {} unread frame(s) before restoring terminal", drained);
        }
        restore_terminal_settings();
        drained
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<F> Drop for TerminalSession<F>
where
    F: Read + Write + AsRawFd,
{
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether some session currently holds the terminal
pub fn is_active() -> bool {
    saved_terminal().is_some()
}

/// Put the saved settings back without draining. Returns `false` when there
/// was nothing to restore, which makes concurrent callers harmless.
pub fn restore_terminal_settings() -> bool {
    let Some(saved) = saved_terminal().take() else {
        return false;
    };

    match write_settings(saved.fd, &saved.settings) {
        Ok(()) => {
            debug!("restored terminal settings on fd {}", saved.fd);
            true
        }
        Err(e) => {
            warn!("Failed to restore terminal settings: {}", e);
            false
        }
    }
}

/// Release path used when the process is being terminated by a signal.
///
/// The session object lives on the main thread, so stray frames are drained
/// through a borrowed handle on the saved descriptor instead.
pub fn release_for_signal() -> bool {
    let Some(saved) = saved_terminal().take() else {
        return false;
    };

    // The descriptor stays owned by the session; never close it from here.
    let mut channel = ManuallyDrop::new(TtyChannel::new(unsafe { File::from_raw_fd(saved.fd) }));
    response::drain(&mut *channel, saved.drain_timeout);

    match write_settings(saved.fd, &saved.settings) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to restore terminal settings: {}", e);
            false
        }
    }
}

extern "C" fn restore_at_exit() {
    restore_terminal_settings();
}

fn install_exit_hooks() {
    EXIT_HOOKS.call_once(|| {
        if unsafe { libc::atexit(restore_at_exit) } != 0 {
            warn!("Could not register terminal restore at exit");
        }

        let mut signals = match Signals::new(TERMINATION_SIGNALS) {
            Ok(signals) => signals,
            Err(e) => {
                warn!("Cannot watch termination signals: {}", e);
                return;
            }
        };

        let spawned = std::thread::Builder::new()
            .name("cellpin-signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    debug!("received signal {}, restoring terminal", signal);
                    release_for_signal();
                    std::process::exit(1);
                }
            });
        if let Err(e) = spawned {
            warn!("Cannot start signal watcher: {}", e);
        }
    });
}

fn quiet_settings(original: &libc::termios) -> libc::termios {
    let mut quiet = *original;
    quiet.c_lflag &= !(libc::ECHO | libc::ICANON);
    quiet.c_cc[libc::VMIN] = 1;
    quiet.c_cc[libc::VTIME] = 0;
    quiet.c_cc[libc::VSUSP] = CONTROL_DISABLED;
    quiet
}

fn read_settings(fd: RawFd) -> io::Result<libc::termios> {
    let mut settings = std::mem::MaybeUninit::<libc::termios>::uninit();
    if unsafe { libc::tcgetattr(fd, settings.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { settings.assume_init() })
}

fn write_settings(fd: RawFd, settings: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, settings) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_settings() -> libc::termios {
        let mut settings: libc::termios = unsafe { std::mem::zeroed() };
        settings.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
        settings.c_iflag = libc::ICRNL | libc::IXON;
        settings.c_cc[libc::VSUSP] = 0x1a;
        settings.c_cc[libc::VINTR] = 0x03;
        settings
    }

    #[test]
    fn test_quiet_settings_disable_echo_and_suspend() {
        let original = sample_settings();
        let quiet = quiet_settings(&original);

        assert_eq!(quiet.c_lflag & libc::ECHO, 0);
        assert_eq!(quiet.c_lflag & libc::ICANON, 0);
        assert_eq!(quiet.c_cc[libc::VSUSP], CONTROL_DISABLED);
        assert_eq!(quiet.c_cc[libc::VMIN], 1);
    }

    #[test]
    fn test_quiet_settings_keep_interrupts() {
        let original = sample_settings();
        let quiet = quiet_settings(&original);

        assert_ne!(quiet.c_lflag & libc::ISIG, 0);
        assert_eq!(quiet.c_cc[libc::VINTR], 0x03);
        assert_eq!(quiet.c_iflag, original.c_iflag);
    }

    #[test]
    fn test_read_settings_rejects_non_terminal() {
        let file = tempfile::tempfile().unwrap();
        assert!(read_settings(file.as_raw_fd()).is_err());
    }
}
