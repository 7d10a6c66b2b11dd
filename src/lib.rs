//! Headless EGL rendering context for a game engine backend.
//!
//! A [`ContextManager`] owns the display, pbuffer surface and GL context
//! picked by the device selector. Each [`swap_buffers`] can optionally
//! mirror the frame into a shared memory-mapped file for another process
//! to poll.
//!
//! [`swap_buffers`]: ContextManager::swap_buffers

pub mod capture;
pub mod config;
pub mod render;

pub use capture::{CopyStrategy, FrameMirror, GlPixelTransfer, PixelLayout, PixelTransfer};
pub use config::{Config, DisplaySource};
pub use render::{create_context, ContextManager, ContextType, EglPlatform, Platform, State};

/// Context manager on the system libEGL and GL.
pub type EglContextManager = ContextManager<EglPlatform, GlPixelTransfer>;

/// Run the fallback ladder against the system libEGL.
pub fn create_egl_context(config: &Config, width: u32, height: u32) -> anyhow::Result<EglContextManager> {
    create_context(
        || Ok((EglPlatform::load()?, GlPixelTransfer::new())),
        config,
        width,
        height,
    )
}
