use std::path::PathBuf;

use crate::capture::{CopyStrategy, PixelLayout};
use crate::render::ContextType;

/// Preferred rendering device, matched against `EGL_CUDA_DEVICE_NV`.
pub const DEVICE_ENV: &str = "EGL_CUDA_ID";
/// Mirror file path. Unset or empty disables mirroring.
pub const MIRROR_PATH_ENV: &str = "EGL_MIRROR_PATH";

/// Where the EGL display comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplaySource {
    /// Enumerate devices and pick one through the device selector.
    #[default]
    Device,
    /// Ask EGL for its default display directly.
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub device_id: Option<i64>,
    pub display_source: DisplaySource,
    pub context_type: ContextType,
    /// Retry once with a GLES2-compatible context when GLES3 fails.
    pub fallback_to_gles2: bool,
    /// Request an 8-bit alpha channel for per-pixel transparency.
    pub transparent: bool,
    pub mirror_path: Option<PathBuf>,
    pub copy_strategy: CopyStrategy,
    pub pixel_layout: PixelLayout,
    /// Applied after the context is up; initialization itself leaves vsync off.
    pub vsync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_id: None,
            display_source: DisplaySource::Device,
            context_type: ContextType::Gles3Compatible,
            fallback_to_gles2: true,
            transparent: false,
            mirror_path: None,
            copy_strategy: CopyStrategy::PackBuffer,
            pixel_layout: PixelLayout::Rgba,
            vsync: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source, on top of the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let device_id = lookup(DEVICE_ENV).and_then(|v| parse_device_id(&v));
        let mirror_path = lookup(MIRROR_PATH_ENV)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            device_id,
            mirror_path,
            ..Self::default()
        }
    }
}

/// Parse a device preference. Anything that is not an integer means
/// "no preference".
pub fn parse_device_id(value: &str) -> Option<i64> {
    value.trim().parse().ok()
}
