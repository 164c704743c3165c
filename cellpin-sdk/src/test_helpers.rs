// ABOUTME: Test doubles standing in for a terminal emulator on the control channel
// ABOUTME: A scripted byte channel and an in-memory image store that answers commands

use crate::channel::Channel;
use crate::command::Command;
use crate::Handle;
use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Instant;

/// Channel replaying canned input and recording every write.
///
/// Running out of input behaves like a timeout, without actually waiting.
pub struct ScriptedChannel {
    input: VecDeque<u8>,
    sent: Vec<Vec<u8>>,
    fail_after: Option<usize>,
}

impl ScriptedChannel {
    pub fn with_input(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            sent: Vec::new(),
            fail_after: None,
        }
    }

    /// Make every send after the first `count` fail with a broken pipe
    pub fn fail_after_sends(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }
}

impl Channel for ScriptedChannel {
    fn send(&mut self, command: &[u8]) -> io::Result<()> {
        if self.fail_after.is_some_and(|limit| self.sent.len() >= limit) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal went away"));
        }
        self.sent.push(command.to_vec());
        Ok(())
    }

    fn recv_byte(&mut self, _deadline: Instant) -> io::Result<Option<u8>> {
        Ok(self.input.pop_front())
    }
}

/// How the fake terminal answers a class of commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Normal,
    Silent,
    Garbage,
    WrongTransferId,
    WithoutTransferId,
}

/// In-memory image store speaking the graphics protocol
pub struct FakeTerminal {
    keys: HashMap<String, Handle>,
    images: HashMap<Handle, Vec<u8>>,
    pending: Option<(u32, String)>,
    output: VecDeque<u8>,
    sent: Vec<Command>,
    next_handle: u32,
    query_reply: Reply,
    upload_reply: Reply,
}

impl FakeTerminal {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            images: HashMap::new(),
            pending: None,
            output: VecDeque::new(),
            sent: Vec::new(),
            next_handle: 0xE000,
            query_reply: Reply::Normal,
            upload_reply: Reply::Normal,
        }
    }

    /// Number the store's handles starting at `first`
    pub fn with_first_handle(mut self, first: u32) -> Self {
        self.next_handle = first;
        self
    }

    pub fn reply_to_queries(mut self, reply: Reply) -> Self {
        self.query_reply = reply;
        self
    }

    pub fn reply_to_uploads(mut self, reply: Reply) -> Self {
        self.upload_reply = reply;
        self
    }

    pub fn sent(&self) -> &[Command] {
        &self.sent
    }

    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Decoded bytes of a completed upload
    pub fn image(&self, handle: Handle) -> Option<Vec<u8>> {
        self.images.get(&handle).cloned()
    }

    /// Short name of a command's role in the protocol
    pub fn describe(command: &Command) -> String {
        let role = match (command.get('a'), command.get('m')) {
            (Some("q"), _) => "query",
            (Some("a"), _) => "assign",
            (Some("t"), _) => "begin",
            (None, Some("1")) => "chunk",
            (None, Some("0")) => "end",
            _ => "unknown",
        };
        role.to_string()
    }

    fn respond(&mut self, frame: String) {
        self.output.extend(frame.into_bytes());
    }

    fn handle_query(&mut self, command: &Command) {
        let key = command.get('K').unwrap_or_default().to_string();
        match self.query_reply {
            Reply::Silent => {}
            Reply::Garbage => self.respond("\x1b_Gi=1;EIO:garbled\x1b\\".to_string()),
            _ => match self.keys.get(&key) {
                Some(handle) => self.respond(format!("\x1b_Gi={};OK\x1b\\", handle)),
                None => self.respond(format!("\x1b_GK={};ENOENT:no such key\x1b\\", key)),
            },
        }
    }

    fn finish_upload(&mut self, transfer_id: u32, data: String) {
        let handle = Handle::new(self.next_handle);
        self.next_handle += 1;
        self.images
            .insert(handle, STANDARD.decode(data).unwrap_or_default());

        match self.upload_reply {
            Reply::Normal => self.respond(format!("\x1b_Gi={},I={};OK\x1b\\", handle, transfer_id)),
            Reply::WrongTransferId => self.respond(format!(
                "\x1b_Gi={},I={};OK\x1b\\",
                handle,
                transfer_id.wrapping_add(1)
            )),
            Reply::WithoutTransferId => self.respond(format!("\x1b_Gi={};OK\x1b\\", handle)),
            Reply::Garbage => self.respond("\x1b_Gi=1;EIO:garbled\x1b\\".to_string()),
            Reply::Silent => {}
        }
    }
}

impl Channel for FakeTerminal {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let command = Command::decode(bytes)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "undecodable command"))?;
        self.sent.push(command.clone());

        let transfer_id = command.get('I').and_then(|v| v.parse::<u32>().ok());
        let payload = command.payload_str().unwrap_or_default().to_string();

        match (command.get('a'), transfer_id) {
            (Some("q"), _) => self.handle_query(&command),
            (Some("a"), _) => {
                if let (Some(key), Some(id)) = (
                    command.get('K'),
                    command.get('i').and_then(|v| v.parse::<u32>().ok()),
                ) {
                    self.keys.insert(key.to_string(), Handle::new(id));
                }
            }
            (Some("t"), Some(id)) => self.pending = Some((id, payload)),
            (None, Some(id)) => {
                if let Some((pending_id, data)) = self.pending.as_mut() {
                    if *pending_id == id {
                        data.push_str(&payload);
                    }
                }
                if command.get('m') == Some("0") {
                    if let Some((pending_id, data)) = self.pending.take() {
                        self.finish_upload(pending_id, data);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn recv_byte(&mut self, _deadline: Instant) -> io::Result<Option<u8>> {
        Ok(self.output.pop_front())
    }
}
