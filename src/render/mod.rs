pub mod context;
pub mod device;
pub mod egl;
pub mod ladder;
pub mod platform;
pub mod surface;

pub use context::{ContextManager, State};
pub use egl::EglPlatform;
pub use ladder::create_context;
pub use platform::Platform;
pub use surface::PbufferSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextType {
    /// Pre-GLES profile, created like the GLES2-compatible variant
    Legacy,
    /// GL 2.0
    Gles2Compatible,
    /// GL 3.3
    #[default]
    Gles3Compatible,
}

impl ContextType {
    /// (major, minor) passed to context creation.
    pub fn requested_version(self) -> (i32, i32) {
        match self {
            ContextType::Gles3Compatible => (3, 3),
            ContextType::Gles2Compatible | ContextType::Legacy => (2, 0),
        }
    }

    /// Lowest driver-reported GL version the renderer can run on.
    pub fn min_gl_version(self) -> (u32, u32) {
        match self {
            ContextType::Gles3Compatible => (3, 3),
            ContextType::Gles2Compatible | ContextType::Legacy => (2, 0),
        }
    }
}
