// ABOUTME: cellpin SDK: client for a terminal emulator's graphics image store
// ABOUTME: Dedup lookups, chunked uploads, response framing, and terminal session control

use std::fmt;

pub mod cache;
pub mod channel;
pub mod client;
pub mod command;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod render;
pub mod response;
pub mod session;
pub mod transfer;

#[cfg(test)]
mod test_helpers;

pub use cache::Lookup;
pub use channel::{Channel, TtyChannel};
pub use client::{ImageStore, Placement, StoreOptions};
pub use dedup::{DedupKey, Geometry};
pub use error::{Error, Result};
pub use render::render_grid;
pub use response::Response;
pub use session::TerminalSession;
pub use transfer::{NoProgress, TransferObserver, TransferProgress};

/// Image identifier assigned by the terminal's image store.
///
/// Valid for the rest of the terminal session, so it outlives this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
