use anyhow::Result;
use std::ffi::c_void;

/// The slice of EGL the context manager drives.
///
/// Handles are plain `Copy` values; ownership of what they point at is
/// tracked by [`ContextManager`](super::ContextManager), never by the
/// platform itself.
pub trait Platform {
    type Device: Copy;
    type Display: Copy;
    type Config: Copy;
    type Surface: Copy;
    type Context: Copy;

    /// Enumerate at most `max` rendering devices. Empty when the device
    /// extensions are missing.
    fn query_devices(&self, max: usize) -> Vec<Self::Device>;

    /// Vendor device index (`EGL_CUDA_DEVICE_NV`), if the device reports one.
    fn device_index(&self, device: Self::Device) -> Option<i64>;

    fn device_display(&self, device: Self::Device) -> Option<Self::Display>;
    fn default_display(&self) -> Option<Self::Display>;

    /// Returns the EGL (major, minor) version of the display.
    fn initialize(&self, display: Self::Display) -> Result<(i32, i32)>;

    fn choose_config(&self, display: Self::Display, attribs: &[i32]) -> Result<Self::Config>;

    fn create_pbuffer_surface(
        &self,
        display: Self::Display,
        config: Self::Config,
        width: i32,
        height: i32,
    ) -> Result<Self::Surface>;

    /// Create a desktop GL context of the requested (major, minor) version.
    fn create_context(
        &self,
        display: Self::Display,
        config: Self::Config,
        version: (i32, i32),
    ) -> Result<Self::Context>;

    fn make_current(
        &self,
        display: Self::Display,
        surface: Option<Self::Surface>,
        context: Option<Self::Context>,
    ) -> Result<()>;

    fn swap_buffers(&self, display: Self::Display, surface: Self::Surface) -> Result<()>;
    fn swap_interval(&self, display: Self::Display, interval: i32) -> Result<()>;
    fn query_surface(
        &self,
        display: Self::Display,
        surface: Self::Surface,
        attribute: i32,
    ) -> Result<i32>;

    fn destroy_surface(&self, display: Self::Display, surface: Self::Surface) -> Result<()>;
    fn destroy_context(&self, display: Self::Display, context: Self::Context) -> Result<()>;
    fn terminate(&self, display: Self::Display) -> Result<()>;

    /// GL entry point lookup, null when unknown.
    fn proc_address(&self, name: &str) -> *const c_void;

    fn context_ptr(&self, context: Self::Context) -> *mut c_void;
}
