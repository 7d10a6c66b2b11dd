use std::ffi::{c_void, CStr};

/// One image plane read back from the framebuffer. Both planes are
/// 4 bytes per pixel: RGBA8 for color, 32-bit float for depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Depth,
    Color,
}

impl Plane {
    pub const BYTES_PER_PIXEL: usize = 4;

    fn gl_format(self) -> (u32, u32) {
        match self {
            Plane::Depth => (gl::DEPTH_COMPONENT, gl::FLOAT),
            Plane::Color => (gl::RGBA, gl::UNSIGNED_BYTE),
        }
    }
}

/// GL pixel-transfer operations used by the capture strategies.
///
/// All calls assume the rendering context is current on this thread.
pub trait PixelTransfer {
    /// Resolve entry points. Called once the context is first made current.
    fn load_with(&mut self, loader: &mut dyn FnMut(&str) -> *const c_void);

    /// Driver-reported GL (major, minor) version.
    fn version(&self) -> Option<(u32, u32)>;

    /// Blocking read of `plane` into client memory.
    fn read_pixels(&mut self, plane: Plane, width: u32, height: u32, dst: &mut [u8]);

    /// Allocate a pixel-pack buffer of `size` bytes, returning its name.
    fn create_pack_buffer(&mut self, size: usize) -> u32;

    /// Orphan the buffer's storage and queue asynchronous reads of each
    /// `(plane, byte offset)` into it.
    fn read_into_pack_buffer(
        &mut self,
        buffer: u32,
        size: usize,
        reads: &[(Plane, usize)],
        width: u32,
        height: u32,
    );

    /// Map the buffer and copy its contents into `dst`. False if mapping failed.
    fn copy_pack_buffer(&mut self, buffer: u32, dst: &mut [u8]) -> bool;

    fn delete_pack_buffer(&mut self, buffer: u32);
}

/// [`PixelTransfer`] on top of the global `gl` bindings.
#[derive(Default)]
pub struct GlPixelTransfer {
    loaded: bool,
}

impl GlPixelTransfer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PixelTransfer for GlPixelTransfer {
    fn load_with(&mut self, loader: &mut dyn FnMut(&str) -> *const c_void) {
        gl::load_with(|s| loader(s));
        self.loaded = true;
    }

    fn version(&self) -> Option<(u32, u32)> {
        if !self.loaded {
            return None;
        }
        let version = unsafe {
            let ptr = gl::GetString(gl::VERSION);
            if ptr.is_null() {
                return None;
            }
            CStr::from_ptr(ptr as *const _).to_string_lossy().into_owned()
        };
        parse_gl_version(&version)
    }

    fn read_pixels(&mut self, plane: Plane, width: u32, height: u32, dst: &mut [u8]) {
        if dst.len() < plane_size(width, height) {
            return;
        }
        let (format, ty) = plane.gl_format();
        unsafe {
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
            gl::ReadPixels(
                0,
                0,
                width as i32,
                height as i32,
                format,
                ty,
                dst.as_mut_ptr() as *mut c_void,
            );
        }
    }

    fn create_pack_buffer(&mut self, size: usize) -> u32 {
        let mut buffer = 0;
        unsafe {
            gl::GenBuffers(1, &mut buffer);
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, buffer);
            gl::BufferData(
                gl::PIXEL_PACK_BUFFER,
                size as isize,
                std::ptr::null(),
                gl::STREAM_READ,
            );
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, 0);
        }
        buffer
    }

    fn read_into_pack_buffer(
        &mut self,
        buffer: u32,
        size: usize,
        reads: &[(Plane, usize)],
        width: u32,
        height: u32,
    ) {
        unsafe {
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, buffer);
            gl::BufferData(
                gl::PIXEL_PACK_BUFFER,
                size as isize,
                std::ptr::null(),
                gl::STREAM_READ,
            );
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
            for &(plane, offset) in reads {
                let (format, ty) = plane.gl_format();
                // With a pack buffer bound the pointer argument is a byte offset.
                gl::ReadPixels(
                    0,
                    0,
                    width as i32,
                    height as i32,
                    format,
                    ty,
                    offset as *mut c_void,
                );
            }
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, 0);
        }
    }

    fn copy_pack_buffer(&mut self, buffer: u32, dst: &mut [u8]) -> bool {
        unsafe {
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, buffer);
            let ptr = gl::MapBufferRange(
                gl::PIXEL_PACK_BUFFER,
                0,
                dst.len() as isize,
                gl::MAP_READ_BIT,
            );
            if ptr.is_null() {
                gl::BindBuffer(gl::PIXEL_PACK_BUFFER, 0);
                return false;
            }
            std::ptr::copy_nonoverlapping(ptr as *const u8, dst.as_mut_ptr(), dst.len());
            gl::UnmapBuffer(gl::PIXEL_PACK_BUFFER);
            gl::BindBuffer(gl::PIXEL_PACK_BUFFER, 0);
        }
        true
    }

    fn delete_pack_buffer(&mut self, buffer: u32) {
        unsafe {
            gl::DeleteBuffers(1, &buffer);
        }
    }
}

pub(crate) fn plane_size(width: u32, height: u32) -> usize {
    width as usize * height as usize * Plane::BYTES_PER_PIXEL
}

/// Extract (major, minor) from a `GL_VERSION` string such as
/// `"4.6.0 NVIDIA 535.54"` or `"OpenGL ES 3.2 Mesa 23.0"`.
pub fn parse_gl_version(version: &str) -> Option<(u32, u32)> {
    let version = version.trim();
    let version = version.strip_prefix("OpenGL ES ").unwrap_or(version);
    let number = version.split_whitespace().next()?;
    let mut parts = number.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .map(|m| m.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
        .and_then(|m| m.parse().ok())?;
    Some((major, minor))
}
