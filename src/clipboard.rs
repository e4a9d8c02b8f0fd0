//! Copying the current artifact to the clipboard as an image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info};
use tiny_skia::Pixmap;

use crate::rendering::RenderArtifact;
use crate::{Error, Result};

/// Destination for copied images.
pub trait ClipboardSink: Send + Sync {
    /// Place a straight-alpha RGBA8 image on the clipboard
    fn write_image(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<()>;
}

/// The platform clipboard, via arboard.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: std::sync::Mutex<arboard::Clipboard>,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    /// Open the platform clipboard.
    ///
    /// Fails with [`Error::ClipboardUnsupported`] when no clipboard is
    /// reachable (headless sessions, missing display server).
    pub fn new() -> Result<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| Error::ClipboardUnsupported(e.to_string()))?;
        Ok(Self {
            inner: std::sync::Mutex::new(clipboard),
        })
    }
}

#[cfg(feature = "clipboard")]
impl ClipboardSink for SystemClipboard {
    fn write_image(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
        let mut clipboard = self
            .inner
            .lock()
            .map_err(|_| Error::ClipboardError("clipboard lock poisoned".into()))?;
        clipboard
            .set_image(arboard::ImageData {
                width: width as usize,
                height: height as usize,
                bytes: std::borrow::Cow::Owned(rgba),
            })
            .map_err(|e| match e {
                arboard::Error::ClipboardNotSupported => Error::ClipboardUnsupported(e.to_string()),
                other => Error::ClipboardError(other.to_string()),
            })
    }
}

/// Copies artifacts to a [`ClipboardSink`], one copy at a time.
pub struct ImageCopier {
    sink: Arc<dyn ClipboardSink>,
    busy: AtomicBool,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ImageCopier {
    pub fn new(sink: Arc<dyn ClipboardSink>) -> Self {
        Self {
            sink,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Copy `artifact` to the clipboard.
    ///
    /// Errors with [`Error::NoArtifact`] when nothing has been generated and
    /// [`Error::CopyInProgress`] when another copy has not finished.
    pub fn copy(&self, artifact: Option<&RenderArtifact>) -> Result<()> {
        let artifact = artifact.ok_or(Error::NoArtifact)?;
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::CopyInProgress);
        }
        let _guard = BusyGuard(&self.busy);

        let rgba = decode_rgba(&artifact.png)?;
        match self.sink.write_image(artifact.width, artifact.height, rgba) {
            Ok(()) => {
                info!("Image copied to clipboard ({}x{})", artifact.width, artifact.height);
                Ok(())
            }
            Err(e) => {
                error!("Failed to copy image: {}", e);
                Err(e)
            }
        }
    }
}

/// Decode PNG bytes into straight-alpha RGBA8.
pub fn decode_rgba(png: &[u8]) -> Result<Vec<u8>> {
    let pixmap =
        Pixmap::decode_png(png).map_err(|e| Error::ClipboardError(format!("cannot decode image: {}", e)))?;
    let mut out = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Ok(out)
}
