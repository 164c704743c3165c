// ABOUTME: High-level image store client combining lookup, upload, and key binding
// ABOUTME: One upload-or-reuse operation per call, with no retries on any failure

use crate::cache::{self, Lookup};
use crate::channel::Channel;
use crate::constants::{timeouts, transfer as limits};
use crate::dedup::{DedupKey, Geometry};
use crate::error::Result;
use crate::render::placeholder_char;
use crate::transfer::{self, TransferObserver, TransferSettings};
use crate::Handle;
use log::info;
use std::time::Duration;
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct StoreOptions {
    #[builder(default = timeouts::RESPONSE_TIMEOUT)]
    pub response_timeout: Duration,

    #[builder(default = limits::CHUNK_SIZE)]
    pub chunk_size: usize,

    #[builder(default = limits::PROGRESS_INTERVAL)]
    pub progress_interval: usize,

    /// Skip the lookup and always upload (the key is still bound afterwards)
    #[builder(default = false)]
    pub force_upload: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// How the handle for an image was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The store already held this content at this geometry
    Reused(Handle),
    /// The image was uploaded and its key bound during this call
    Uploaded(Handle),
}

impl Placement {
    pub fn handle(&self) -> Handle {
        match self {
            Placement::Reused(handle) | Placement::Uploaded(handle) => *handle,
        }
    }
}

/// Client for the terminal's image store over one control channel
pub struct ImageStore<C: Channel> {
    channel: C,
    options: StoreOptions,
}

impl<C: Channel> ImageStore<C> {
    pub fn new(channel: C, options: StoreOptions) -> Self {
        Self { channel, options }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn lookup(&mut self, key: &DedupKey) -> Result<Lookup> {
        cache::lookup(&mut self.channel, key, self.options.response_timeout)
    }

    pub fn bind(&mut self, handle: Handle, key: &DedupKey) -> Result<()> {
        cache::bind(&mut self.channel, handle, key)
    }

    pub fn upload(
        &mut self,
        payload: &[u8],
        geometry: Geometry,
        observer: &mut dyn TransferObserver,
    ) -> Result<Handle> {
        let settings = TransferSettings {
            chunk_size: self.options.chunk_size,
            progress_interval: self.options.progress_interval,
            response_timeout: self.options.response_timeout,
        };
        transfer::upload(&mut self.channel, payload, geometry, &settings, observer)
    }

    /// Reuse the stored image for `key` or upload a new one.
    ///
    /// `load_payload` runs only on a cache miss, so conversion work is skipped
    /// entirely when the store already has the image. The key is bound only
    /// after the upload has been confirmed and the handle is renderable.
    pub fn place<L>(
        &mut self,
        key: &DedupKey,
        geometry: Geometry,
        load_payload: L,
        observer: &mut dyn TransferObserver,
    ) -> Result<Placement>
    where
        L: FnOnce() -> Result<Vec<u8>>,
    {
        if !self.options.force_upload {
            if let Lookup::Found(handle) = self.lookup(key)? {
                placeholder_char(handle)?;
                return Ok(Placement::Reused(handle));
            }
        }

        let payload = load_payload()?;
        let handle = self.upload(&payload, geometry, observer)?;
        // A handle without a glyph can never be displayed; keep it unbound
        placeholder_char(handle)?;
        self.bind(handle, key)?;
        info!("bound {} to handle {}", key, handle);

        Ok(Placement::Uploaded(handle))
    }

    pub fn into_channel(self) -> C {
        self.channel
    }
}
