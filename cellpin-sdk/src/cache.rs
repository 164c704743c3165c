// ABOUTME: Content cache client for the terminal's image store
// ABOUTME: Looks up handles by dedup key and binds freshly uploaded handles to keys

use crate::channel::Channel;
use crate::command::Command;
use crate::dedup::DedupKey;
use crate::error::{Error, Result};
use crate::response::{read_response, Response};
use crate::Handle;
use log::{debug, info};
use std::time::Duration;

/// Result of asking the store whether it already holds an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(Handle),
    NotFound,
}

/// Query the store for the handle bound to `key`.
///
/// Anything other than a success or an explicit not-found frame is fatal:
/// the store is behaving unexpectedly and guessing would risk showing the
/// wrong image.
pub fn lookup<C: Channel + ?Sized>(
    channel: &mut C,
    key: &DedupKey,
    timeout: Duration,
) -> Result<Lookup> {
    debug!("looking up key {}", key);
    channel.send(&Command::query(key).encode())?;

    match read_response(channel, timeout)? {
        Response::Success { handle, .. } => {
            info!("cache hit: {} -> handle {}", key, handle);
            Ok(Lookup::Found(handle))
        }
        Response::NotFound { .. } => {
            info!("cache miss: {}", key);
            Ok(Lookup::NotFound)
        }
        Response::Malformed(frame) => Err(Error::protocol("malformed response to query", &frame)),
        Response::NoResponse => Err(Error::protocol(
            format!("no response to query within {} ms", timeout.as_millis()),
            b"",
        )),
    }
}

/// Bind `key` to `handle` so later lookups for the same content hit.
///
/// Sent in quiet mode: the handle is already known and usable, so no
/// confirmation is awaited.
pub fn bind<C: Channel + ?Sized>(channel: &mut C, handle: Handle, key: &DedupKey) -> Result<()> {
    debug!("binding key {} to handle {}", key, handle);
    channel.send(&Command::assign(handle, key).encode())?;
    Ok(())
}
