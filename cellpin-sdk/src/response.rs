// ABOUTME: Response reader for the terminal control channel
// ABOUTME: Reads one terminator-delimited frame under a timeout and classifies it

use crate::channel::Channel;
use crate::constants::{keys, wire};
use crate::error::{escape_control, Result};
use crate::Handle;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io;
use std::time::{Duration, Instant};

/// `ESC _ G <params> ; <message> ESC`, the frame as seen before the `\` terminator
static RESPONSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\x1b_G([^;\x1b]*);([^\x1b]*)\x1b$").expect("response pattern is valid")
});

/// Raw outcome of waiting for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRead {
    /// Terminator seen; holds the bytes before it
    Complete(Vec<u8>),
    /// Timed out (or overflowed) after some bytes arrived
    Partial(Vec<u8>),
    /// Timed out with nothing at all
    Empty,
}

/// Classified response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success {
        handle: Handle,
        transfer_id: Option<u32>,
        frame: Vec<u8>,
    },
    NotFound {
        frame: Vec<u8>,
    },
    Malformed(Vec<u8>),
    NoResponse,
}

impl Response {
    /// Escaped frame content for diagnostics
    pub fn raw(&self) -> String {
        match self {
            Response::Success { frame, .. }
            | Response::NotFound { frame }
            | Response::Malformed(frame) => escape_control(frame),
            Response::NoResponse => String::new(),
        }
    }
}

/// Read bytes until the frame terminator or until `timeout` elapses
pub fn read_frame<C: Channel + ?Sized>(
    channel: &mut C,
    timeout: Duration,
) -> io::Result<FrameRead> {
    read_frame_until(channel, Instant::now() + timeout)
}

/// Read bytes until the frame terminator or until `deadline` passes.
///
/// The deadline is checked before every byte, so input that is already
/// buffered cannot stretch a read past it.
pub fn read_frame_until<C: Channel + ?Sized>(
    channel: &mut C,
    deadline: Instant,
) -> io::Result<FrameRead> {
    let mut frame = Vec::new();

    while Instant::now() < deadline {
        let Some(byte) = channel.recv_byte(deadline)? else {
            break;
        };
        if byte == wire::FRAME_TERMINATOR {
            return Ok(FrameRead::Complete(frame));
        }
        frame.push(byte);
        if frame.len() >= wire::MAX_FRAME_LEN {
            return Ok(FrameRead::Partial(frame));
        }
    }

    if frame.is_empty() {
        Ok(FrameRead::Empty)
    } else {
        Ok(FrameRead::Partial(frame))
    }
}

/// Map a frame onto the closed set of responses the client understands
pub fn classify(read: FrameRead) -> Response {
    let frame = match read {
        FrameRead::Empty => return Response::NoResponse,
        FrameRead::Partial(bytes) => return Response::Malformed(bytes),
        FrameRead::Complete(bytes) => bytes,
    };

    let parsed = std::str::from_utf8(&frame).ok().and_then(|text| {
        let caps = RESPONSE_PATTERN.captures(text)?;
        let params = caps.get(1).map_or("", |m| m.as_str());
        let message = caps.get(2).map_or("", |m| m.as_str());
        Some((params.to_string(), message.to_string()))
    });

    let Some((params, message)) = parsed else {
        return Response::Malformed(frame);
    };

    if message == wire::RESPONSE_OK {
        return match success_ids(&params) {
            Some((handle, transfer_id)) => Response::Success {
                handle,
                transfer_id,
                frame,
            },
            None => Response::Malformed(frame),
        };
    }

    let not_found = message
        .strip_prefix(wire::RESPONSE_NOT_FOUND)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'));
    if not_found {
        Response::NotFound { frame }
    } else {
        Response::Malformed(frame)
    }
}

/// Extract the handle (required) and transfer id (optional) of a success frame
fn success_ids(params: &str) -> Option<(Handle, Option<u32>)> {
    let mut handle = None;
    let mut transfer_id = None;

    for pair in params.split(',') {
        let (key, value) = pair.split_once('=')?;
        match key {
            k if k.len() == 1 && k.starts_with(keys::IMAGE_ID) => {
                handle = Some(value.parse::<u32>().ok().filter(|&id| id != 0)?);
            }
            k if k.len() == 1 && k.starts_with(keys::TRANSFER_ID) => {
                transfer_id = Some(value.parse::<u32>().ok()?);
            }
            k if k.len() == 1 => {}
            _ => return None,
        }
    }

    Some((Handle::new(handle?), transfer_id))
}

/// Read and classify one response frame
pub fn read_response<C: Channel + ?Sized>(
    channel: &mut C,
    timeout: Duration,
) -> Result<Response> {
    let response = classify(read_frame(channel, timeout)?);
    debug!("response: {:?} \"{}\"", discriminant_name(&response), response.raw());
    Ok(response)
}

/// Discard frames left on the channel, spending at most `timeout` in total.
///
/// Returns the number of frames (complete or cut short) thrown away. Errors
/// end the drain silently; it only runs while tearing the session down.
pub fn drain<C: Channel + ?Sized>(channel: &mut C, timeout: Duration) -> usize {
    let deadline = Instant::now() + timeout;
    let mut drained = 0;
    loop {
        match read_frame_until(channel, deadline) {
            Ok(FrameRead::Complete(frame)) => {
                debug!("drained stray frame \"{}\"", escape_control(&frame));
                drained += 1;
            }
            Ok(FrameRead::Partial(frame)) => {
                debug!("drained partial frame of {} bytes", frame.len());
                drained += 1;
            }
            Ok(FrameRead::Empty) | Err(_) => return drained,
        }
    }
}

fn discriminant_name(response: &Response) -> &'static str {
    match response {
        Response::Success { .. } => "success",
        Response::NotFound { .. } => "not-found",
        Response::Malformed(_) => "malformed",
        Response::NoResponse => "none",
    }
}
