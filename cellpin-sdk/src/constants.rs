// ABOUTME: Centralized constants for the cellpin SDK
// ABOUTME: Contains wire envelope bytes, protocol keys, timeouts, and transfer limits

/// Control channel envelope
pub mod wire {
    /// Application Program Command introducer followed by the graphics marker
    pub const COMMAND_START: &[u8] = b"\x1b_G";

    /// String Terminator closing every command and response
    pub const COMMAND_END: &[u8] = b"\x1b\\";

    /// Single byte that ends a response frame on the read side
    pub const FRAME_TERMINATOR: u8 = b'\\';

    /// Message body of a successful response
    pub const RESPONSE_OK: &str = "OK";

    /// Message prefix of an explicit not-found response
    pub const RESPONSE_NOT_FOUND: &str = "ENOENT";

    /// Upper bound on bytes accepted into a single frame
    pub const MAX_FRAME_LEN: usize = 4096;
}

/// Command keys and values understood by the image store
pub mod keys {
    pub const ACTION: char = 'a';
    pub const IMAGE_ID: char = 'i';
    pub const TRANSFER_ID: char = 'I';
    pub const DEDUP_KEY: char = 'K';
    pub const QUIET: char = 'q';
    pub const TRANSMISSION: char = 't';
    pub const FORMAT: char = 'f';
    pub const COLUMNS: char = 'c';
    pub const ROWS: char = 'r';
    pub const MORE: char = 'm';

    pub const ACTION_QUERY: &str = "q";
    pub const ACTION_ASSIGN: &str = "a";
    pub const ACTION_TRANSMIT: &str = "t";

    /// Payload travels inline in the command stream
    pub const TRANSMISSION_DIRECT: &str = "d";

    /// PNG encoded payload
    pub const FORMAT_PNG: u32 = 100;

    /// Suppress both success and failure responses
    pub const QUIET_ALL: u32 = 2;
}

/// Channel timeouts
pub mod timeouts {
    use std::time::Duration;

    /// How long to wait for a query or end-of-transfer response
    pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(2000);

    /// How long to wait for stray frames while releasing the terminal
    pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
}

/// Chunked transfer limits
pub mod transfer {
    /// Encoded bytes per chunk frame (multiple of 4 so chunks stay valid base64)
    pub const CHUNK_SIZE: usize = 4096;

    /// Chunks sent between two progress reports
    pub const PROGRESS_INTERVAL: usize = 64;
}

/// Placeholder grid rendering
pub mod grid {
    /// Highest row count whose index fits a 256-color palette entry
    pub const MAX_COLORED_ROWS: u32 = 256;

    /// Upper bound on either side of the grid, in cells
    pub const MAX_DIMENSION: u32 = 1024;

    /// Resets the foreground color after the grid
    pub const STYLE_RESET: &str = "\x1b[39m";
}
