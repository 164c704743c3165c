// ABOUTME: Error types for the cellpin SDK with user-friendly messages
// ABOUTME: Every variant is fatal for the current invocation; nothing here is retried

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read image {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot take control of the terminal: {0}")]
    TerminalAcquisition(#[source] io::Error),

    #[error("Image conversion failed: {0}")]
    Conversion(String),

    #[error("Control channel I/O failed: {0}")]
    ChannelIo(#[from] io::Error),

    #[error("Protocol error: {reason} (response: \"{raw}\")")]
    Protocol { reason: String, raw: String },

    #[error("Response does not belong to transfer {expected} (response: \"{raw}\")")]
    Correlation { expected: u32, raw: String },

    #[error("Invalid geometry {columns}x{rows}: {reason}")]
    InvalidGeometry {
        columns: u32,
        rows: u32,
        reason: &'static str,
    },

    #[error("Handle {0} does not map to a private-use codepoint")]
    InvalidHandle(u32),
}

impl Error {
    /// Build a protocol error, escaping control characters in the raw frame
    pub fn protocol(reason: impl Into<String>, raw: &[u8]) -> Self {
        Error::Protocol {
            reason: reason.into(),
            raw: escape_control(raw),
        }
    }

    pub fn correlation(expected: u32, raw: &[u8]) -> Self {
        Error::Correlation {
            expected,
            raw: escape_control(raw),
        }
    }

    pub fn help_text(&self) -> Option<&'static str> {
        match self {
            Error::Input { .. } => Some("Check that the image path exists and is readable"),
            Error::TerminalAcquisition(_) => {
                Some("cellpin must run attached to a terminal (it talks to /dev/tty)")
            }
            Error::Conversion(_) => {
                Some("Convert the image to PNG manually or configure a `converter` command")
            }
            Error::Protocol { .. } | Error::Correlation { .. } => Some(
                "The terminal does not seem to speak this graphics protocol dialect; \
                 run with --verbose to see the exchanged commands",
            ),
            _ => None,
        }
    }
}

/// Render raw channel bytes printable, so responses can be shown in diagnostics
pub fn escape_control(raw: &[u8]) -> String {
    raw.iter()
        .flat_map(|&byte| std::ascii::escape_default(byte))
        .map(char::from)
        .collect()
}
