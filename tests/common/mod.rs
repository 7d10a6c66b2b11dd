#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use khronos_egl as egl;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::rc::Rc;

use egl_mirror::capture::transfer::{PixelTransfer, Plane};
use egl_mirror::{Config, ContextManager, CopyStrategy, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedDisplay {
    Device(usize),
    Default,
}

/// In-memory stand-in for libEGL.
#[derive(Default)]
pub struct EglState {
    /// `EGL_CUDA_DEVICE_NV` per enumerated device, `None` if unreadable.
    pub devices: Vec<Option<i64>>,
    pub opened: Option<OpenedDisplay>,
    pub initialized: bool,
    pub fail_versions: Vec<(i32, i32)>,
    pub fail_config: bool,
    pub config_attribs: Vec<i32>,
    pub requested_versions: Vec<(i32, i32)>,
    pub surfaces: HashMap<u32, (i32, i32)>,
    pub contexts: Vec<u32>,
    pub current: Option<(Option<u32>, Option<u32>)>,
    pub swap_interval: Option<i32>,
    pub swaps: usize,
    pub terminated: usize,
    next_handle: u32,
}

impl EglState {
    fn handle(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    pub fn bound_surface(&self) -> Option<u32> {
        self.current.and_then(|(surface, _)| surface)
    }

    pub fn bound_context(&self) -> Option<u32> {
        self.current.and_then(|(_, context)| context)
    }
}

#[derive(Clone, Default)]
pub struct FakeEgl {
    pub state: Rc<RefCell<EglState>>,
}

impl FakeEgl {
    pub fn with_devices(devices: &[Option<i64>]) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().devices = devices.to_vec();
        fake
    }
}

const DISPLAY: u32 = 1000;

impl Platform for FakeEgl {
    type Device = usize;
    type Display = u32;
    type Config = u32;
    type Surface = u32;
    type Context = u32;

    fn query_devices(&self, max: usize) -> Vec<usize> {
        (0..self.state.borrow().devices.len().min(max)).collect()
    }

    fn device_index(&self, device: usize) -> Option<i64> {
        self.state.borrow().devices[device]
    }

    fn device_display(&self, device: usize) -> Option<u32> {
        self.state.borrow_mut().opened = Some(OpenedDisplay::Device(device));
        Some(DISPLAY)
    }

    fn default_display(&self) -> Option<u32> {
        self.state.borrow_mut().opened = Some(OpenedDisplay::Default);
        Some(DISPLAY)
    }

    fn initialize(&self, _display: u32) -> Result<(i32, i32)> {
        self.state.borrow_mut().initialized = true;
        Ok((1, 5))
    }

    fn choose_config(&self, _display: u32, attribs: &[i32]) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        state.config_attribs = attribs.to_vec();
        if state.fail_config {
            bail!("No suitable EGL config found");
        }
        Ok(state.handle())
    }

    fn create_pbuffer_surface(
        &self,
        _display: u32,
        _config: u32,
        width: i32,
        height: i32,
    ) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        let surface = state.handle();
        state.surfaces.insert(surface, (width, height));
        Ok(surface)
    }

    fn create_context(&self, _display: u32, _config: u32, version: (i32, i32)) -> Result<u32> {
        let mut state = self.state.borrow_mut();
        state.requested_versions.push(version);
        if state.fail_versions.contains(&version) {
            bail!("Failed to create EGL context");
        }
        let context = state.handle();
        state.contexts.push(context);
        Ok(context)
    }

    fn make_current(
        &self,
        _display: u32,
        surface: Option<u32>,
        context: Option<u32>,
    ) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(surface) = surface {
            if !state.surfaces.contains_key(&surface) {
                bail!("EGL_BAD_SURFACE");
            }
        }
        state.current = Some((surface, context));
        Ok(())
    }

    fn swap_buffers(&self, _display: u32, surface: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.surfaces.contains_key(&surface) {
            bail!("EGL_BAD_SURFACE");
        }
        state.swaps += 1;
        Ok(())
    }

    fn swap_interval(&self, _display: u32, interval: i32) -> Result<()> {
        self.state.borrow_mut().swap_interval = Some(interval);
        Ok(())
    }

    fn query_surface(&self, _display: u32, surface: u32, attribute: i32) -> Result<i32> {
        let state = self.state.borrow();
        let (width, height) = state
            .surfaces
            .get(&surface)
            .copied()
            .ok_or_else(|| anyhow!("EGL_BAD_SURFACE"))?;
        match attribute {
            egl::WIDTH => Ok(width),
            egl::HEIGHT => Ok(height),
            _ => bail!("EGL_BAD_ATTRIBUTE"),
        }
    }

    fn destroy_surface(&self, _display: u32, surface: u32) -> Result<()> {
        self.state
            .borrow_mut()
            .surfaces
            .remove(&surface)
            .map(|_| ())
            .ok_or_else(|| anyhow!("EGL_BAD_SURFACE"))
    }

    fn destroy_context(&self, _display: u32, context: u32) -> Result<()> {
        self.state.borrow_mut().contexts.retain(|c| *c != context);
        Ok(())
    }

    fn terminate(&self, _display: u32) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.terminated += 1;
        state.initialized = false;
        Ok(())
    }

    fn proc_address(&self, _name: &str) -> *const c_void {
        std::ptr::null()
    }

    fn context_ptr(&self, context: u32) -> *mut c_void {
        context as usize as *mut c_void
    }
}

/// In-memory stand-in for the GL readback calls. The "framebuffer" is a
/// uniform fill: `color` for every color byte, `depth` for every depth byte.
pub struct GlState {
    pub version: Option<(u32, u32)>,
    pub color: u8,
    pub depth: u8,
    pub loaded: bool,
    pub buffers: HashMap<u32, Vec<u8>>,
    pub created: usize,
    pub deleted: usize,
    pub sync_reads: usize,
    pub async_reads: usize,
    pub maps: usize,
    next_buffer: u32,
}

impl Default for GlState {
    fn default() -> Self {
        Self {
            version: Some((4, 6)),
            color: 0,
            depth: 0,
            loaded: false,
            buffers: HashMap::new(),
            created: 0,
            deleted: 0,
            sync_reads: 0,
            async_reads: 0,
            maps: 0,
            next_buffer: 0,
        }
    }
}

impl GlState {
    fn fill(&self, plane: Plane) -> u8 {
        match plane {
            Plane::Color => self.color,
            Plane::Depth => self.depth,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeGl {
    pub state: Rc<RefCell<GlState>>,
}

impl FakeGl {
    pub fn with_version(version: Option<(u32, u32)>) -> Self {
        let fake = Self::default();
        fake.state.borrow_mut().version = version;
        fake
    }

    /// Render a new uniform scene.
    pub fn draw(&self, color: u8) {
        self.state.borrow_mut().color = color;
    }
}

impl PixelTransfer for FakeGl {
    fn load_with(&mut self, _loader: &mut dyn FnMut(&str) -> *const c_void) {
        self.state.borrow_mut().loaded = true;
    }

    fn version(&self) -> Option<(u32, u32)> {
        self.state.borrow().version
    }

    fn read_pixels(&mut self, plane: Plane, width: u32, height: u32, dst: &mut [u8]) {
        let mut state = self.state.borrow_mut();
        state.sync_reads += 1;
        let len = width as usize * height as usize * Plane::BYTES_PER_PIXEL;
        dst[..len].fill(state.fill(plane));
    }

    fn create_pack_buffer(&mut self, size: usize) -> u32 {
        let mut state = self.state.borrow_mut();
        state.next_buffer += 1;
        let buffer = state.next_buffer;
        state.buffers.insert(buffer, vec![0; size]);
        state.created += 1;
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
        let mut state = self.state.borrow_mut();
        state.async_reads += 1;
        let len = width as usize * height as usize * Plane::BYTES_PER_PIXEL;
        let mut data = vec![0; size];
        for &(plane, offset) in reads {
            data[offset..offset + len].fill(state.fill(plane));
        }
        state.buffers.insert(buffer, data);
    }

    fn copy_pack_buffer(&mut self, buffer: u32, dst: &mut [u8]) -> bool {
        let mut state = self.state.borrow_mut();
        state.maps += 1;
        match state.buffers.get(&buffer) {
            Some(data) if data.len() == dst.len() => {
                dst.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn delete_pack_buffer(&mut self, buffer: u32) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(&buffer);
        state.deleted += 1;
    }
}

pub type FakeManager = ContextManager<FakeEgl, FakeGl>;

pub fn manager(egl: &FakeEgl, gl: &FakeGl, config: Config) -> FakeManager {
    ContextManager::new(egl.clone(), gl.clone(), config)
}

pub fn no_mirror() -> Config {
    Config {
        copy_strategy: CopyStrategy::Disabled,
        ..Config::default()
    }
}
