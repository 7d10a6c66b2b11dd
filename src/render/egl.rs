use anyhow::{Context, Result};
use khronos_egl as egl;
use std::ffi::c_void;

use super::platform::Platform;

// EGL_EXT_platform_device / EGL_NV_device_cuda
const EGL_PLATFORM_DEVICE_EXT: egl::Enum = 0x313F;
const EGL_CUDA_DEVICE_NV: egl::Int = 0x323A;

type QueryDevicesEXT = unsafe extern "C" fn(egl::Int, *mut *mut c_void, *mut egl::Int) -> egl::Boolean;
type QueryDeviceAttribEXT = unsafe extern "C" fn(*mut c_void, egl::Int, *mut egl::Attrib) -> egl::Boolean;

/// Opaque `EGLDeviceEXT`.
#[derive(Debug, Clone, Copy)]
pub struct Device(*mut c_void);

/// [`Platform`] backed by the system libEGL, loaded at runtime.
pub struct EglPlatform {
    pub egl: egl::DynamicInstance<egl::EGL1_5>,
    query_devices: Option<QueryDevicesEXT>,
    query_device_attrib: Option<QueryDeviceAttribEXT>,
}

impl EglPlatform {
    pub fn load() -> Result<Self> {
        let egl = unsafe { egl::DynamicInstance::<egl::EGL1_5>::load_required() }
            .context("Failed to load EGL")?;

        // Optional device enumeration entry points
        let query_devices = egl
            .get_proc_address("eglQueryDevicesEXT")
            .map(|f| unsafe { std::mem::transmute::<extern "system" fn(), QueryDevicesEXT>(f) });
        let query_device_attrib = egl
            .get_proc_address("eglQueryDeviceAttribEXT")
            .map(|f| unsafe {
                std::mem::transmute::<extern "system" fn(), QueryDeviceAttribEXT>(f)
            });

        Ok(Self {
            egl,
            query_devices,
            query_device_attrib,
        })
    }
}

impl Platform for EglPlatform {
    type Device = Device;
    type Display = egl::Display;
    type Config = egl::Config;
    type Surface = egl::Surface;
    type Context = egl::Context;

    fn query_devices(&self, max: usize) -> Vec<Device> {
        let Some(query) = self.query_devices else {
            return Vec::new();
        };

        let mut devices = vec![std::ptr::null_mut(); max];
        let mut count: egl::Int = 0;
        let ok = unsafe { query(max as egl::Int, devices.as_mut_ptr(), &mut count) };
        if ok == egl::FALSE {
            return Vec::new();
        }

        devices.truncate(count.clamp(0, max as egl::Int) as usize);
        devices.into_iter().map(Device).collect()
    }

    fn device_index(&self, device: Device) -> Option<i64> {
        let query = self.query_device_attrib?;
        let mut value: egl::Attrib = 0;
        let ok = unsafe { query(device.0, EGL_CUDA_DEVICE_NV, &mut value) };
        (ok != egl::FALSE).then_some(value as isize as i64)
    }

    fn device_display(&self, device: Device) -> Option<egl::Display> {
        unsafe {
            self.egl
                .get_platform_display(EGL_PLATFORM_DEVICE_EXT, device.0, &[egl::ATTRIB_NONE])
        }
        .ok()
    }

    fn default_display(&self) -> Option<egl::Display> {
        unsafe { self.egl.get_display(egl::DEFAULT_DISPLAY) }
    }

    fn initialize(&self, display: egl::Display) -> Result<(i32, i32)> {
        self.egl
            .initialize(display)
            .context("Failed to initialize EGL")
    }

    fn choose_config(&self, display: egl::Display, attribs: &[i32]) -> Result<egl::Config> {
        self.egl
            .choose_first_config(display, attribs)
            .context("Failed to choose EGL config")?
            .ok_or_else(|| anyhow::anyhow!("No suitable EGL config found"))
    }

    fn create_pbuffer_surface(
        &self,
        display: egl::Display,
        config: egl::Config,
        width: i32,
        height: i32,
    ) -> Result<egl::Surface> {
        // Pbuffers take their size up front
        let attribs = [egl::WIDTH, width, egl::HEIGHT, height, egl::NONE];
        self.egl
            .create_pbuffer_surface(display, config, &attribs)
            .context("Failed to create EGL pbuffer surface")
    }

    fn create_context(
        &self,
        display: egl::Display,
        config: egl::Config,
        version: (i32, i32),
    ) -> Result<egl::Context> {
        // Bind desktop OpenGL API
        self.egl
            .bind_api(egl::OPENGL_API)
            .context("Failed to bind OpenGL API")?;

        // Create context
        let context_attribs = [
            egl::CONTEXT_MAJOR_VERSION,
            version.0,
            egl::CONTEXT_MINOR_VERSION,
            version.1,
            egl::NONE,
        ];

        self.egl
            .create_context(display, config, None, &context_attribs)
            .context("Failed to create EGL context")
    }

    fn make_current(
        &self,
        display: egl::Display,
        surface: Option<egl::Surface>,
        context: Option<egl::Context>,
    ) -> Result<()> {
        self.egl
            .make_current(display, surface, surface, context)
            .context("Failed to make EGL context current")
    }

    fn swap_buffers(&self, display: egl::Display, surface: egl::Surface) -> Result<()> {
        self.egl
            .swap_buffers(display, surface)
            .context("Failed to swap buffers")
    }

    fn swap_interval(&self, display: egl::Display, interval: i32) -> Result<()> {
        self.egl
            .swap_interval(display, interval)
            .context("Failed to set swap interval")
    }

    fn query_surface(
        &self,
        display: egl::Display,
        surface: egl::Surface,
        attribute: i32,
    ) -> Result<i32> {
        self.egl
            .query_surface(display, surface, attribute)
            .context("Failed to query EGL surface")
    }

    fn destroy_surface(&self, display: egl::Display, surface: egl::Surface) -> Result<()> {
        self.egl
            .destroy_surface(display, surface)
            .context("Failed to destroy EGL surface")
    }

    fn destroy_context(&self, display: egl::Display, context: egl::Context) -> Result<()> {
        self.egl
            .destroy_context(display, context)
            .context("Failed to destroy EGL context")
    }

    fn terminate(&self, display: egl::Display) -> Result<()> {
        self.egl.terminate(display).context("Failed to terminate EGL")
    }

    fn proc_address(&self, name: &str) -> *const c_void {
        self.egl
            .get_proc_address(name)
            .map(|p| p as *const c_void)
            .unwrap_or(std::ptr::null())
    }

    fn context_ptr(&self, context: egl::Context) -> *mut c_void {
        context.as_ptr()
    }
}
