use anyhow::{bail, Result};
use khronos_egl as egl;
use log::{debug, info, warn};
use std::ffi::c_void;
use std::path::Path;

use super::device::select_display;
use super::platform::Platform;
use super::surface::PbufferSurface;
use super::ContextType;
use crate::capture::{FrameMirror, PixelTransfer};
use crate::config::{Config, DisplaySource};

// Layered config: per-pixel transparency needs an alpha channel.
const LAYERED_CONFIG: &[egl::Int] = &[
    egl::RENDERABLE_TYPE,
    egl::OPENGL_BIT | egl::OPENGL_ES2_BIT,
    egl::SURFACE_TYPE,
    egl::PBUFFER_BIT,
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::ALPHA_SIZE,
    8,
    egl::DEPTH_SIZE,
    24,
    egl::NONE,
];

const SIMPLE_CONFIG: &[egl::Int] = &[
    egl::RENDERABLE_TYPE,
    egl::OPENGL_BIT | egl::OPENGL_ES2_BIT,
    egl::SURFACE_TYPE,
    egl::PBUFFER_BIT,
    egl::RED_SIZE,
    8,
    egl::GREEN_SIZE,
    8,
    egl::BLUE_SIZE,
    8,
    egl::DEPTH_SIZE,
    24,
    egl::NONE,
];

/// Lifecycle of a [`ContextManager`]. `TornDown` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initialized,
    TornDown,
}

/// Everything that exists between a successful initialize and teardown.
struct Live<P: Platform> {
    display: P::Display,
    context: P::Context,
    config: P::Config,
    surface: Option<PbufferSurface<P>>,
    egl_version: (i32, i32),
}

/// Owns the EGL display, config, pbuffer surface and GL context.
///
/// Only one thread may have the context current at a time and callers
/// serialize every call; there is no internal locking.
pub struct ContextManager<P: Platform, G: PixelTransfer> {
    platform: P,
    gl: G,
    config: Config,
    live: Option<Live<P>>,
    mirror: Option<FrameMirror>,
    use_vsync: bool,
    torn_down: bool,
}

impl<P: Platform, G: PixelTransfer> ContextManager<P, G> {
    pub fn new(platform: P, gl: G, config: Config) -> Self {
        Self {
            platform,
            gl,
            config,
            live: None,
            mirror: None,
            use_vsync: false,
            torn_down: false,
        }
    }

    pub fn state(&self) -> State {
        if self.torn_down {
            State::TornDown
        } else if self.live.is_some() {
            State::Initialized
        } else {
            State::Uninitialized
        }
    }

    pub fn context_type(&self) -> ContextType {
        self.config.context_type
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the display, create a `width`x`height` pbuffer and a context on
    /// it, and make it current. Vsync ends up disabled.
    ///
    /// Any failure leaves the manager uninitialized with nothing allocated.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.state() != State::Uninitialized {
            bail!("EGL context already initialized or torn down");
        }

        let display = match self.config.display_source {
            DisplaySource::Device => select_display(&self.platform, self.config.device_id),
            DisplaySource::Default => self.platform.default_display(),
        }
        .ok_or_else(|| anyhow::anyhow!("Failed to get EGL display"))?;

        let live = match self.create_live(display, width, height) {
            Ok(live) => live,
            Err(e) => {
                let _ = self.platform.terminate(display);
                return Err(e);
            }
        };
        info!(
            "EGL {}.{} context ({:?}, {}) on {}x{} pbuffer",
            live.egl_version.0,
            live.egl_version.1,
            self.config.context_type,
            if self.config.transparent { "layered" } else { "opaque" },
            width,
            height
        );
        self.live = Some(live);

        let platform = &self.platform;
        self.gl.load_with(&mut |name| platform.proc_address(name));

        if let Some(mut mirror) =
            FrameMirror::new(self.config.copy_strategy, self.config.pixel_layout)
        {
            mirror.set_target(self.config.mirror_path.as_deref(), width, height);
            self.mirror = Some(mirror);
        }

        self.set_use_vsync(false);
        Ok(())
    }

    fn create_live(&self, display: P::Display, width: u32, height: u32) -> Result<Live<P>> {
        let platform = &self.platform;
        let egl_version = platform.initialize(display)?;

        // Choose config
        let attribs = if self.config.transparent {
            LAYERED_CONFIG
        } else {
            SIMPLE_CONFIG
        };
        let config = platform.choose_config(display, attribs)?;

        let surface = PbufferSurface::new(platform, display, config, width, height)?;

        // Create context (binds the desktop GL API)
        let context = match platform.create_context(
            display,
            config,
            self.config.context_type.requested_version(),
        ) {
            Ok(context) => context,
            Err(e) => {
                let _ = surface.destroy(platform, display);
                return Err(e);
            }
        };

        // Make current
        if let Err(e) = platform.make_current(display, Some(surface.handle), Some(context)) {
            let _ = surface.destroy(platform, display);
            let _ = platform.destroy_context(display, context);
            return Err(e);
        }

        Ok(Live {
            display,
            context,
            config,
            surface: Some(surface),
            egl_version,
        })
    }

    fn live(&self) -> Result<&Live<P>> {
        self.live
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("EGL context is not initialized"))
    }

    pub fn make_current(&self) -> Result<()> {
        let live = self.live()?;
        let surface = live.surface.as_ref().map(|s| s.handle);
        self.platform
            .make_current(live.display, surface, Some(live.context))
    }

    /// Unbind the context from this thread. A no-op without a context.
    pub fn release_current(&self) -> Result<()> {
        match &self.live {
            Some(live) => self.platform.make_current(live.display, None, None),
            None => Ok(()),
        }
    }

    /// Replace the pbuffer with one of the new size and rebind it. An active
    /// mirror is re-mapped to match.
    ///
    /// On error the old surface stays in place and bound.
    pub fn set_buffer_size(&mut self, width: u32, height: u32) -> Result<()> {
        let live = self
            .live
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("EGL context is not initialized"))?;
        let platform = &self.platform;

        // Create the replacement while the old pbuffer is still bound
        let surface = PbufferSurface::new(platform, live.display, live.config, width, height)?;

        // Switch the context over to it
        if let Err(e) = platform.make_current(live.display, Some(surface.handle), Some(live.context))
        {
            let _ = surface.destroy(platform, live.display);
            return Err(e.context("Failed to bind resized pbuffer"));
        }

        // Old surface is no longer current
        if let Some(old) = live.surface.replace(surface) {
            if let Err(e) = old.destroy(platform, live.display) {
                warn!("{:#}", e);
            }
        }
        debug!("Resized pbuffer to {}x{}", width, height);

        if let Some(mirror) = self.mirror.as_mut() {
            mirror.resize(width, height);
            mirror.discard_stale(&mut self.gl);
        }
        Ok(())
    }

    /// Present the frame, mirroring it first when a mirror target is active.
    pub fn swap_buffers(&mut self) -> Result<()> {
        let live = self.live()?;
        let display = live.display;
        let surface = live
            .surface
            .as_ref()
            .map(|s| s.handle)
            .ok_or_else(|| anyhow::anyhow!("No pbuffer surface bound"))?;

        match self.mirror.as_mut().filter(|m| m.is_active()) {
            None => self.platform.swap_buffers(display, surface),
            Some(mirror) => {
                mirror.before_present(&mut self.gl);
                self.platform.swap_buffers(display, surface)?;
                mirror.after_present(&mut self.gl);
                Ok(())
            }
        }
    }

    /// Set the swap interval. The value is cached for [`is_using_vsync`]
    /// and not re-read from EGL, so changes made elsewhere are not seen.
    ///
    /// [`is_using_vsync`]: Self::is_using_vsync
    pub fn set_use_vsync(&mut self, enabled: bool) {
        if let Some(live) = &self.live {
            if let Err(e) = self.platform.swap_interval(live.display, enabled as i32) {
                warn!("{:#}", e);
            }
        }
        self.use_vsync = enabled;
    }

    pub fn is_using_vsync(&self) -> bool {
        self.use_vsync
    }

    fn surface_size(&self) -> Option<(u32, u32)> {
        let live = self.live.as_ref()?;
        let surface = live.surface.as_ref()?;
        surface.query_size(&self.platform, live.display).ok()
    }

    /// Width as reported by EGL, 0 without a surface.
    pub fn get_window_width(&self) -> u32 {
        self.surface_size().map_or(0, |(w, _)| w)
    }

    pub fn get_window_height(&self) -> u32 {
        self.surface_size().map_or(0, |(_, h)| h)
    }

    /// Raw `EGLContext`, null when there is none.
    pub fn native_handle(&self) -> *mut c_void {
        self.live
            .as_ref()
            .map_or(std::ptr::null_mut(), |live| self.platform.context_ptr(live.context))
    }

    pub fn egl_version(&self) -> Option<(i32, i32)> {
        self.live.as_ref().map(|live| live.egl_version)
    }

    pub fn gl_version(&self) -> Option<(u32, u32)> {
        self.gl.version()
    }

    /// Whether the driver's GL version can run this context type.
    pub fn is_viable(&self) -> bool {
        self.gl_version()
            .is_some_and(|v| v >= self.config.context_type.min_gl_version())
    }

    /// Retarget the mirror at `path` for the current surface size. `None`
    /// turns mirroring off. Returns whether mirroring is active.
    pub fn set_mirror_target(&mut self, path: Option<&Path>) -> bool {
        let Some((width, height)) = self.surface_size() else {
            return false;
        };
        let Some(mirror) = self.mirror.as_mut() else {
            return false;
        };
        let active = mirror.set_target(path, width, height);
        mirror.discard_stale(&mut self.gl);
        active
    }

    /// The mirror, if the copy strategy has one.
    pub fn mirror(&self) -> Option<&FrameMirror> {
        self.mirror.as_ref()
    }

    /// Release the context and destroy everything. Later calls do nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        let Some(mut live) = self.live.take() else {
            self.mirror = None;
            return;
        };
        let platform = &self.platform;

        if let Some(mut mirror) = self.mirror.take() {
            let surface = live.surface.as_ref().map(|s| s.handle);
            if platform
                .make_current(live.display, surface, Some(live.context))
                .is_ok()
            {
                mirror.release(&mut self.gl);
            }
        }

        let _ = platform.make_current(live.display, None, None);
        if let Some(surface) = live.surface.take() {
            let _ = surface.destroy(platform, live.display);
        }
        let _ = platform.destroy_context(live.display, live.context);
        let _ = platform.terminate(live.display);
        info!("EGL context torn down");
    }
}

impl<P: Platform, G: PixelTransfer> Drop for ContextManager<P, G> {
    fn drop(&mut self) {
        self.teardown();
    }
}
