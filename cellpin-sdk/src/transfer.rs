// ABOUTME: Chunked transfer engine pushing image bytes to the terminal's image store
// ABOUTME: Base64 chunks framed as begin/continue/end commands, correlated by transfer id

use crate::channel::Channel;
use crate::command::Command;
use crate::dedup::Geometry;
use crate::error::{Error, Result};
use crate::response::{read_response, Response};
use crate::Handle;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, info};
use once_cell::sync::Lazy;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Transfer ids handed out so far; an id is never reused within the process
static USED_TRANSFER_IDS: Lazy<Mutex<HashSet<u32>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Snapshot of an upload in flight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProgress {
    pub chunks_sent: usize,
    pub total_chunks: usize,
    pub bytes_sent: usize,
    pub total_bytes: usize,
    pub elapsed: Duration,
}

impl TransferProgress {
    /// Coarse throughput of encoded bytes since the transfer began
    pub fn bytes_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds <= 0.0 {
            0.0
        } else {
            self.bytes_sent as f64 / seconds
        }
    }
}

/// Receives progress reports. Implementations must not influence the transfer.
pub trait TransferObserver {
    fn started(&mut self, _total_chunks: usize, _total_bytes: usize) {}

    fn progress(&mut self, _progress: &TransferProgress) {}

    fn finished(&mut self, _progress: &TransferProgress) {}
}

/// Observer that ignores every report
pub struct NoProgress;

impl TransferObserver for NoProgress {}

/// Pick a transfer id that has not been used by this process
pub fn next_transfer_id() -> u32 {
    let mut used = USED_TRANSFER_IDS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut rng = rand::thread_rng();
    loop {
        let id = rng.gen_range(1..=u32::MAX);
        if used.insert(id) {
            return id;
        }
    }
}

/// Base64-encode `payload` and split it into chunks of at most `chunk_size`
/// characters. The size is rounded down to a multiple of 4 (minimum 4) so each
/// chunk decodes on its own.
pub fn encode_chunks(payload: &[u8], chunk_size: usize) -> Vec<String> {
    let chunk_size = (chunk_size / 4).max(1) * 4;
    let encoded = STANDARD.encode(payload);

    // Base64 output is ASCII, so every byte offset is a char boundary
    (0..encoded.len())
        .step_by(chunk_size)
        .map(|start| encoded[start..(start + chunk_size).min(encoded.len())].to_string())
        .collect()
}

/// Settings for one upload
#[derive(Debug, Clone, Copy)]
pub struct TransferSettings {
    pub chunk_size: usize,
    pub progress_interval: usize,
    pub response_timeout: Duration,
}

/// Upload `payload` and return the handle the store assigned to it.
///
/// Chunks are pushed without per-chunk acknowledgement. A write failure at
/// any point aborts the whole transfer; there is no resume.
pub fn upload<C: Channel + ?Sized>(
    channel: &mut C,
    payload: &[u8],
    geometry: Geometry,
    settings: &TransferSettings,
    observer: &mut dyn TransferObserver,
) -> Result<Handle> {
    let chunks = encode_chunks(payload, settings.chunk_size);
    let total_bytes: usize = chunks.iter().map(String::len).sum();
    let transfer_id = next_transfer_id();
    let interval = settings.progress_interval.max(1);

    debug!(
        "uploading {} bytes as {} chunk(s), transfer id {}",
        payload.len(),
        chunks.len(),
        transfer_id
    );

    let start = Instant::now();
    channel.send(&Command::begin_transfer(transfer_id, geometry).encode())?;
    observer.started(chunks.len(), total_bytes);

    let mut progress = TransferProgress {
        chunks_sent: 0,
        total_chunks: chunks.len(),
        bytes_sent: 0,
        total_bytes,
        elapsed: Duration::ZERO,
    };

    for chunk in &chunks {
        channel.send(&Command::chunk(transfer_id, chunk).encode())?;
        progress.chunks_sent += 1;
        progress.bytes_sent += chunk.len();

        if progress.chunks_sent % interval == 0 {
            progress.elapsed = start.elapsed();
            observer.progress(&progress);
        }
    }

    channel.send(&Command::end_transfer(transfer_id).encode())?;
    progress.elapsed = start.elapsed();
    observer.finished(&progress);

    match read_response(channel, settings.response_timeout)? {
        Response::Success {
            handle,
            transfer_id: Some(echoed),
            ..
        } if echoed == transfer_id => {
            info!(
                "uploaded {} bytes as handle {} in {:.2?}",
                payload.len(),
                handle,
                progress.elapsed
            );
            Ok(handle)
        }
        Response::Success { frame, .. } => Err(Error::correlation(transfer_id, &frame)),
        Response::NotFound { frame } => {
            Err(Error::protocol("terminal rejected the upload", &frame))
        }
        Response::Malformed(frame) => {
            Err(Error::protocol("malformed response to upload", &frame))
        }
        Response::NoResponse => Err(Error::protocol(
            format!(
                "no response to upload within {} ms",
                settings.response_timeout.as_millis()
            ),
            b"",
        )),
    }
}
