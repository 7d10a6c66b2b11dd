pub mod transfer;
pub mod mapping;
pub mod readback;

use log::{info, warn};
use std::path::{Path, PathBuf};

pub use transfer::{GlPixelTransfer, PixelTransfer, Plane};
pub use mapping::SharedMapping;
pub use readback::{Capture, CopyStrategy, FrameGeometry, PixelLayout};

/// Mirrors each presented frame into a shared memory-mapped file.
///
/// Inactive whenever there is no target path or the file could not be
/// sized; an inactive mirror holds no mapping and touches no GL state.
/// External readers get no synchronization and may observe torn frames.
pub struct FrameMirror {
    capture: Box<dyn Capture>,
    layout: PixelLayout,
    path: Option<PathBuf>,
    mapping: Option<SharedMapping>,
    width: u32,
    height: u32,
    /// GPU staging predates the current target and must not be drained.
    stale: bool,
}

impl FrameMirror {
    /// `None` for [`CopyStrategy::Disabled`].
    pub fn new(strategy: CopyStrategy, layout: PixelLayout) -> Option<Self> {
        Some(Self {
            capture: strategy.capture()?,
            layout,
            path: None,
            mapping: None,
            width: 0,
            height: 0,
            stale: false,
        })
    }

    /// Point the mirror at `path`, sized for a `width`x`height` frame.
    ///
    /// Any previous mapping is dropped first and GPU staging is marked for
    /// release. Returns whether mirroring is active afterwards; a missing
    /// path and a failed mapping both leave it inactive.
    pub fn set_target(&mut self, path: Option<&Path>, width: u32, height: u32) -> bool {
        self.mapping = None;
        self.stale = true;
        self.path = path.map(Path::to_path_buf);
        self.width = width;
        self.height = height;

        let Some(path) = path else {
            return false;
        };

        let size = self.layout.frame_size(width, height);
        match SharedMapping::create(path, size) {
            Ok(mapping) => {
                info!(
                    "Mirroring {}x{} {:?} frames to {} ({} bytes)",
                    width,
                    height,
                    self.layout,
                    path.display(),
                    size
                );
                self.mapping = Some(mapping);
                true
            }
            Err(e) => {
                warn!("Frame mirroring disabled: {:#}", e);
                false
            }
        }
    }

    /// Re-map the current target for new surface dimensions.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return self.is_active();
        }
        let path = self.path.clone();
        self.set_target(path.as_deref(), width, height)
    }

    pub fn is_active(&self) -> bool {
        self.mapping.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width,
            height: self.height,
            layout: self.layout,
        }
    }

    /// Mirrored bytes, empty while inactive.
    pub fn frame(&self) -> &[u8] {
        self.mapping.as_ref().map(SharedMapping::as_slice).unwrap_or(&[])
    }

    /// Free staging left over from a previous target. The context must be
    /// current.
    pub(crate) fn discard_stale(&mut self, gl: &mut dyn PixelTransfer) {
        if std::mem::take(&mut self.stale) {
            self.capture.release(gl);
        }
    }

    pub(crate) fn before_present(&mut self, gl: &mut dyn PixelTransfer) {
        self.discard_stale(gl);
        let frame = self.geometry();
        let Some(mapping) = self.mapping.as_mut() else {
            return;
        };
        self.capture.setup(gl, &frame);
        self.capture.copy(gl, &frame, mapping.as_mut_slice());
    }

    pub(crate) fn after_present(&mut self, gl: &mut dyn PixelTransfer) {
        if self.mapping.is_some() {
            let frame = self.geometry();
            self.capture.reissue(gl, &frame);
        }
    }

    /// Free GPU staging and the mapping. The context must be current.
    pub(crate) fn release(&mut self, gl: &mut dyn PixelTransfer) {
        self.capture.release(gl);
        self.mapping = None;
        self.stale = false;
    }
}
