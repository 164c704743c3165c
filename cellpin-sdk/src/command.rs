// ABOUTME: Encoder for graphics commands sent over the terminal control channel
// ABOUTME: Produces `ESC _ G k=v,k=v[;payload] ESC \` envelopes from typed builders

use crate::constants::{keys, wire};
use crate::dedup::{DedupKey, Geometry};
use crate::Handle;

/// One graphics command, kept as an ordered key/value list plus optional payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    params: Vec<(char, String)>,
    payload: Option<String>,
}

impl Command {
    fn new() -> Self {
        Self {
            params: Vec::new(),
            payload: None,
        }
    }

    fn param(mut self, key: char, value: impl ToString) -> Self {
        let value = value.to_string();
        // Keys are single ASCII letters and values never contain separators
        // (`=` is allowed: parsers split each pair at its first `=`). Anything
        // else is a bug in this module, not a runtime condition.
        debug_assert!(key.is_ascii_alphabetic(), "invalid command key {:?}", key);
        debug_assert!(
            !value.is_empty() && !value.contains([',', ';', '\x1b']),
            "invalid value {:?} for key {}",
            value,
            key
        );
        self.params.push((key, value));
        self
    }

    fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Ask the store for the handle bound to `key`
    pub fn query(key: &DedupKey) -> Self {
        Self::new()
            .param(keys::ACTION, keys::ACTION_QUERY)
            .param(keys::DEDUP_KEY, key)
    }

    /// Bind `key` to an existing handle without asking for a confirmation
    pub fn assign(handle: Handle, key: &DedupKey) -> Self {
        Self::new()
            .param(keys::ACTION, keys::ACTION_ASSIGN)
            .param(keys::IMAGE_ID, handle)
            .param(keys::DEDUP_KEY, key)
            .param(keys::QUIET, keys::QUIET_ALL)
    }

    /// Open a chunked inline transfer
    pub fn begin_transfer(transfer_id: u32, geometry: Geometry) -> Self {
        Self::new()
            .param(keys::ACTION, keys::ACTION_TRANSMIT)
            .param(keys::TRANSMISSION, keys::TRANSMISSION_DIRECT)
            .param(keys::FORMAT, keys::FORMAT_PNG)
            .param(keys::TRANSFER_ID, transfer_id)
            .param(keys::COLUMNS, geometry.columns())
            .param(keys::ROWS, geometry.rows())
            .param(keys::MORE, 1)
            .payload("")
    }

    pub fn chunk(transfer_id: u32, data: &str) -> Self {
        Self::new()
            .param(keys::TRANSFER_ID, transfer_id)
            .param(keys::MORE, 1)
            .payload(data)
    }

    pub fn end_transfer(transfer_id: u32) -> Self {
        Self::new()
            .param(keys::TRANSFER_ID, transfer_id)
            .param(keys::MORE, 0)
            .payload("")
    }

    pub fn get(&self, key: char) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");

        let payload_len = self.payload.as_ref().map_or(0, |p| p.len() + 1);
        let mut out = Vec::with_capacity(
            wire::COMMAND_START.len() + body.len() + payload_len + wire::COMMAND_END.len(),
        );
        out.extend_from_slice(wire::COMMAND_START);
        out.extend_from_slice(body.as_bytes());
        if let Some(payload) = &self.payload {
            out.push(b';');
            out.extend_from_slice(payload.as_bytes());
        }
        out.extend_from_slice(wire::COMMAND_END);
        out
    }

    /// Parse an encoded command back into its parts.
    ///
    /// Used by the fake terminal in tests and by debug logging; real traffic
    /// only ever flows client to terminal through [`Command::encode`].
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let inner = bytes
            .strip_prefix(wire::COMMAND_START)?
            .strip_suffix(wire::COMMAND_END)?;
        let inner = std::str::from_utf8(inner).ok()?;

        let (body, payload) = match inner.split_once(';') {
            Some((body, payload)) => (body, Some(payload.to_string())),
            None => (inner, None),
        };

        let mut params = Vec::new();
        for pair in body.split(',').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=')?;
            let mut chars = key.chars();
            let key = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            params.push((key, value.to_string()));
        }

        Some(Self { params, payload })
    }
}
