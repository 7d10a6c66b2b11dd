use log::debug;

use super::transfer::{plane_size, PixelTransfer, Plane};

/// How the mirrored bytes are laid out. Planes are row-major, tightly packed
/// and stored back to back with no header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// RGBA8 color only.
    #[default]
    Rgba,
    /// 32-bit float depth plane followed by the RGBA8 color plane.
    DepthRgba,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelLayout::Rgba => Plane::BYTES_PER_PIXEL,
            PixelLayout::DepthRgba => 2 * Plane::BYTES_PER_PIXEL,
        }
    }

    pub fn frame_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }

    /// Planes to read and their byte offset within one frame.
    pub fn reads(self, width: u32, height: u32) -> Vec<(Plane, usize)> {
        match self {
            PixelLayout::Rgba => vec![(Plane::Color, 0)],
            PixelLayout::DepthRgba => vec![
                (Plane::Depth, 0),
                (Plane::Color, plane_size(width, height)),
            ],
        }
    }
}

/// Readback strategy, fixed when the context is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyStrategy {
    /// No readback; swaps are a plain present.
    Disabled,
    /// Blocking `glReadPixels` before every present. No lag, stalls the GPU.
    Synchronous,
    /// Asynchronous reads through a pixel-pack buffer, one frame behind.
    #[default]
    PackBuffer,
}

impl CopyStrategy {
    pub fn capture(self) -> Option<Box<dyn Capture>> {
        match self {
            CopyStrategy::Disabled => None,
            CopyStrategy::Synchronous => Some(Box::new(SyncReadback)),
            CopyStrategy::PackBuffer => Some(Box::new(PackBufferReadback::default())),
        }
    }
}

/// Dimensions and layout of the frame being captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
}

impl FrameGeometry {
    pub fn size(&self) -> usize {
        self.layout.frame_size(self.width, self.height)
    }
}

/// The three phases of a mirrored swap. `setup` and `copy` run before the
/// present, `reissue` right after it.
pub trait Capture {
    fn setup(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry);
    fn copy(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry, dst: &mut [u8]);
    fn reissue(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry);
    /// Free GPU resources. The context must still be current.
    fn release(&mut self, gl: &mut dyn PixelTransfer);
}

/// Reads straight into the mirror before presenting.
pub struct SyncReadback;

impl Capture for SyncReadback {
    fn setup(&mut self, _gl: &mut dyn PixelTransfer, _frame: &FrameGeometry) {}

    fn copy(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry, dst: &mut [u8]) {
        if dst.len() < frame.size() {
            return;
        }
        let plane = plane_size(frame.width, frame.height);
        for (kind, offset) in frame.layout.reads(frame.width, frame.height) {
            gl.read_pixels(kind, frame.width, frame.height, &mut dst[offset..offset + plane]);
        }
    }

    fn reissue(&mut self, _gl: &mut dyn PixelTransfer, _frame: &FrameGeometry) {}

    fn release(&mut self, _gl: &mut dyn PixelTransfer) {}
}

struct Staged {
    buffer: u32,
    frame: FrameGeometry,
}

/// Double-buffered readback: the pack buffer is filled asynchronously after
/// each present and drained before the next one, so the mirror trails the
/// presented frame by exactly one swap.
#[derive(Default)]
pub struct PackBufferReadback {
    staged: Option<Staged>,
}

impl PackBufferReadback {
    fn issue(gl: &mut dyn PixelTransfer, staged: &Staged) {
        let frame = &staged.frame;
        gl.read_into_pack_buffer(
            staged.buffer,
            frame.size(),
            &frame.layout.reads(frame.width, frame.height),
            frame.width,
            frame.height,
        );
    }
}

impl Capture for PackBufferReadback {
    fn setup(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry) {
        if matches!(&self.staged, Some(staged) if staged.frame == *frame) {
            return;
        }

        self.release(gl);
        let staged = Staged {
            buffer: gl.create_pack_buffer(frame.size()),
            frame: *frame,
        };
        debug!(
            "Created pack buffer {} for {}x{} {:?}",
            staged.buffer, frame.width, frame.height, frame.layout
        );
        Self::issue(gl, &staged);
        self.staged = Some(staged);
    }

    fn copy(&mut self, gl: &mut dyn PixelTransfer, frame: &FrameGeometry, dst: &mut [u8]) {
        let Some(staged) = &self.staged else {
            return;
        };
        if staged.frame != *frame || dst.len() != frame.size() {
            return;
        }
        if !gl.copy_pack_buffer(staged.buffer, dst) {
            debug!("Failed to map pack buffer {}", staged.buffer);
        }
    }

    fn reissue(&mut self, gl: &mut dyn PixelTransfer, _frame: &FrameGeometry) {
        if let Some(staged) = &self.staged {
            Self::issue(gl, staged);
        }
    }

    fn release(&mut self, gl: &mut dyn PixelTransfer) {
        if let Some(staged) = self.staged.take() {
            gl.delete_pack_buffer(staged.buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_plane_comes_first() {
        assert_eq!(
            PixelLayout::DepthRgba.reads(4, 2),
            vec![(Plane::Depth, 0), (Plane::Color, 32)]
        );
        assert_eq!(PixelLayout::Rgba.reads(4, 2), vec![(Plane::Color, 0)]);
    }

    #[test]
    fn frame_size_follows_layout() {
        assert_eq!(PixelLayout::Rgba.frame_size(96, 96), 96 * 96 * 4);
        assert_eq!(PixelLayout::DepthRgba.frame_size(96, 96), 96 * 96 * 8);
    }

    #[test]
    fn disabled_strategy_has_no_capture() {
        assert!(CopyStrategy::Disabled.capture().is_none());
        assert!(CopyStrategy::Synchronous.capture().is_some());
        assert!(CopyStrategy::PackBuffer.capture().is_some());
    }
}
