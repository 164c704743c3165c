// ABOUTME: Control channel abstraction over the terminal device
// ABOUTME: Blocking writes plus byte reads bounded by a poll(2) timeout

use log::trace;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Bidirectional side channel to the terminal emulator.
///
/// Commands go out as whole envelopes; responses come back byte by byte so
/// the reader can stop exactly at a frame terminator.
pub trait Channel {
    /// Write one complete command
    fn send(&mut self, command: &[u8]) -> io::Result<()>;

    /// Next input byte, or `None` once `deadline` has passed with nothing to read
    fn recv_byte(&mut self, deadline: Instant) -> io::Result<Option<u8>>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn send(&mut self, command: &[u8]) -> io::Result<()> {
        (**self).send(command)
    }

    fn recv_byte(&mut self, deadline: Instant) -> io::Result<Option<u8>> {
        (**self).recv_byte(deadline)
    }
}

/// Channel backed by a terminal file descriptor
pub struct TtyChannel<F = File> {
    device: F,
    buffer: [u8; 1024],
    start: usize,
    end: usize,
}

impl TtyChannel<File> {
    /// Open the controlling terminal, independent of stdin/stdout redirection
    pub fn open() -> io::Result<Self> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")?;
        Ok(Self::new(device))
    }
}

impl<F> TtyChannel<F>
where
    F: Read + Write + AsRawFd,
{
    pub fn new(device: F) -> Self {
        Self {
            device,
            buffer: [0; 1024],
            start: 0,
            end: 0,
        }
    }

    pub fn device(&self) -> &F {
        &self.device
    }

    /// Wait until the device is readable or `timeout` elapses
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut fds = libc::pollfd {
            fd: self.device.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as libc::c_int;

        loop {
            let ready = unsafe { libc::poll(&mut fds, 1, millis) };
            if ready >= 0 {
                return Ok(ready > 0);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn fill(&mut self, deadline: Instant) -> io::Result<bool> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.wait_readable(remaining)? {
                return Ok(false);
            }

            match self.device.read(&mut self.buffer) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "terminal closed the control channel",
                    ));
                }
                Ok(n) => {
                    trace!("read {} bytes from terminal", n);
                    self.start = 0;
                    self.end = n;
                    return Ok(true);
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<F> Channel for TtyChannel<F>
where
    F: Read + Write + AsRawFd,
{
    fn send(&mut self, command: &[u8]) -> io::Result<()> {
        self.device.write_all(command)?;
        self.device.flush()
    }

    fn recv_byte(&mut self, deadline: Instant) -> io::Result<Option<u8>> {
        if self.start >= self.end && !self.fill(deadline)? {
            return Ok(None);
        }
        let byte = self.buffer[self.start];
        self.start += 1;
        Ok(Some(byte))
    }
}

impl<F: AsRawFd> AsRawFd for TtyChannel<F> {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}
