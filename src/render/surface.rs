use anyhow::{bail, Result};
use khronos_egl as egl;

use super::platform::Platform;

/// Off-screen pbuffer surface owned by the context manager.
pub struct PbufferSurface<P: Platform> {
    pub handle: P::Surface,
}

impl<P: Platform> PbufferSurface<P> {
    pub fn new(
        platform: &P,
        display: P::Display,
        config: P::Config,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let (w, h) = checked_size(width, height)?;
        let handle = platform.create_pbuffer_surface(display, config, w, h)?;

        Ok(Self { handle })
    }

    /// Current dimensions as reported by EGL.
    pub fn query_size(&self, platform: &P, display: P::Display) -> Result<(u32, u32)> {
        let width = platform.query_surface(display, self.handle, egl::WIDTH)?;
        let height = platform.query_surface(display, self.handle, egl::HEIGHT)?;
        Ok((width.max(0) as u32, height.max(0) as u32))
    }

    pub fn destroy(self, platform: &P, display: P::Display) -> Result<()> {
        platform.destroy_surface(display, self.handle)
    }
}

fn checked_size(width: u32, height: u32) -> Result<(i32, i32)> {
    if width == 0 || height == 0 {
        bail!("Invalid pbuffer size {}x{}", width, height);
    }
    let w = i32::try_from(width).map_err(|_| anyhow::anyhow!("Pbuffer width {} too large", width))?;
    let h = i32::try_from(height).map_err(|_| anyhow::anyhow!("Pbuffer height {} too large", height))?;
    Ok((w, h))
}
