//! Background asset loading.
//!
//! Images decode on worker threads; finished loads queue on a channel until
//! the frame loop drains them. There is no cancellation: every request
//! eventually delivers exactly one outcome.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::asset::{OverlayImage, SlotKind};
use crate::error::Result;

/// The result of one load request.
#[derive(Debug)]
pub struct LoadOutcome {
    pub slot: SlotKind,
    /// Where the image came from, for status and logging.
    pub source: String,
    pub result: Result<OverlayImage>,
}

#[derive(Debug, Clone)]
pub struct AssetLoader {
    tx: Sender<LoadOutcome>,
    rx: Receiver<LoadOutcome>,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Decode an image file into `slot` in the background.
    pub fn request(&self, slot: SlotKind, path: impl Into<PathBuf>) {
        let path = path.into();
        let source = path.display().to_string();
        self.request_with(slot, source, move || OverlayImage::from_path(&path));
    }

    /// Run an arbitrary load job in the background.
    pub fn request_with<F>(&self, slot: SlotKind, source: impl Into<String>, job: F)
    where
        F: FnOnce() -> Result<OverlayImage> + Send + 'static,
    {
        let source = source.into();
        tracing::debug!("Loading {} asset from {}", slot, source);

        let tx = self.tx.clone();
        let worker_source = source.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-load-{slot}"))
            .spawn(move || {
                let result = job();
                // The receiver only disappears when the loader is dropped.
                let _ = tx.send(LoadOutcome {
                    slot,
                    source: worker_source,
                    result,
                });
            });

        if let Err(e) = spawned {
            let _ = self.tx.send(LoadOutcome {
                slot,
                source,
                result: Err(e.into()),
            });
        }
    }

    /// All outcomes that completed since the last call, without blocking.
    pub fn drain(&self) -> Vec<LoadOutcome> {
        self.rx.try_iter().collect()
    }

    /// Block until the next outcome arrives or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<LoadOutcome> {
        self.rx.recv_timeout(timeout).ok()
    }
}
