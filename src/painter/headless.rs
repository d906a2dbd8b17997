// src/painter/headless.rs
//! Headless backend: an in-memory `Screen` and a recording `Receiver`.
//!
//! Used by the CLI and by tests where no window exists. Published frames can
//! optionally be written out as numbered PNG files.

use crate::config::AppearanceConfig;
use crate::painter::texture::{Scene, Size, Texture, TextureId};
use crate::painter::{Receiver, Screen};
use anyhow::{bail, Context, Result};
use image::RgbaImage;
use log::{debug, error, info, trace};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Allocates plain in-memory textures styled with one appearance.
pub struct HeadlessScreen {
    appearance: AppearanceConfig,
    next_id: AtomicU64,
}

impl HeadlessScreen {
    pub fn new(appearance: AppearanceConfig) -> Self {
        Self {
            appearance,
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for HeadlessScreen {
    fn default() -> Self {
        Self::new(AppearanceConfig::default())
    }
}

impl Screen for HeadlessScreen {
    fn new_texture(&self, size: Size) -> Result<Texture> {
        if size.width == 0 || size.height == 0 {
            bail!(
                "Cannot allocate a {}x{} texture",
                size.width,
                size.height
            );
        }
        let id = TextureId(self.next_id.fetch_add(1, Ordering::Relaxed));
        trace!("HeadlessScreen: Allocated {:?}", id);
        Ok(Texture::new(id, size, self.appearance.clone()))
    }
}

/// Last frame seen by a `FrameRecorder`.
#[derive(Debug, Clone)]
pub struct RecordedFrame {
    pub texture: TextureId,
    pub scene: Scene,
    pub pixels: RgbaImage,
}

struct Export {
    dir: PathBuf,
    prefix: String,
}

impl Export {
    fn write_png(&self, index: u64, pixels: &RgbaImage) -> Result<PathBuf> {
        let path = self.dir.join(format!("{}-{:04}.png", self.prefix, index));
        pixels
            .save(&path)
            .with_context(|| format!("Failed to write frame {}", path.display()))?;
        Ok(path)
    }
}

/// Background thread encoding exported frames, so PNG encoding stays out of
/// the loop's critical section.
struct FrameWriter {
    frames_tx: Sender<(u64, RgbaImage)>,
    handle: JoinHandle<()>,
}

impl FrameWriter {
    fn spawn(export: Export) -> Result<Self> {
        let (frames_tx, frames_rx) = channel::<(u64, RgbaImage)>();
        let handle = thread::Builder::new()
            .name("frame-writer".to_string())
            .spawn(move || {
                for (index, pixels) in frames_rx {
                    match export.write_png(index, &pixels) {
                        Ok(path) => trace!("FrameWriter: Wrote {}", path.display()),
                        Err(e) => error!("FrameWriter: {:#}", e),
                    }
                }
                debug!("FrameWriter: Channel closed, exiting");
            })
            .context("Failed to spawn frame writer thread")?;
        Ok(Self { frames_tx, handle })
    }
}

#[derive(Default)]
struct RecorderState {
    frames: u64,
    last: Option<RecordedFrame>,
}

/// Receiver that keeps a copy of the latest frame and counts publishes.
#[derive(Default)]
pub struct FrameRecorder {
    state: Mutex<RecorderState>,
    writer: Mutex<Option<FrameWriter>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also writes every frame to `<dir>/<prefix>-NNNN.png` on a writer
    /// thread. Call `finish` to wait for pending writes.
    pub fn with_export(dir: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create frame directory {}", dir.display()))?;
        let writer = FrameWriter::spawn(Export {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
        })?;
        info!("FrameRecorder: Exporting frames to {}", dir.display());
        Ok(Self {
            state: Mutex::default(),
            writer: Mutex::new(Some(writer)),
        })
    }

    /// Number of frames received.
    pub fn frames(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).frames
    }

    pub fn last_frame(&self) -> Option<RecordedFrame> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    /// Stops exporting and waits until every frame received so far is on
    /// disk. Frames received afterwards are only recorded in memory.
    pub fn finish(&self) {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(FrameWriter { frames_tx, handle }) = writer {
            drop(frames_tx);
            if handle.join().is_err() {
                error!("FrameRecorder: Frame writer thread panicked");
            }
        }
    }
}

impl Receiver for FrameRecorder {
    fn update(&self, frame: &Texture) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frames += 1;
        let index = state.frames;
        state.last = Some(RecordedFrame {
            texture: frame.id(),
            scene: frame.scene().clone(),
            pixels: frame.pixels().clone(),
        });

        // Sent while the state lock is held so the writer sees frames in order.
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(writer) = writer.as_ref() {
            if writer
                .frames_tx
                .send((index, frame.pixels().clone()))
                .is_err()
            {
                error!("FrameRecorder: Frame writer is gone, frame {} not exported", index);
            }
        }
    }
}

impl Drop for FrameRecorder {
    fn drop(&mut self) {
        self.finish();
    }
}
