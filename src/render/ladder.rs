use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use super::context::ContextManager;
use super::platform::Platform;
use super::ContextType;
use crate::capture::PixelTransfer;
use crate::config::Config;

const UNSUPPORTED_DRIVER: &str = "Unable to initialize video driver: your video card driver does \
     not support any of the supported OpenGL versions";

/// Context types to attempt, in order. At most one downgrade.
pub fn fallback_ladder(config: &Config) -> Vec<ContextType> {
    let mut ladder = vec![config.context_type];
    if config.fallback_to_gles2 && config.context_type == ContextType::Gles3Compatible {
        ladder.push(ContextType::Gles2Compatible);
    }
    ladder
}

/// Bring up a context, downgrading from GLES3- to GLES2-compatible when
/// creation or the viability check fails and the config allows it.
///
/// `factory` supplies a fresh platform and GL loader for every attempt.
/// Running out of rungs is fatal. On success the configured vsync
/// preference is applied.
pub fn create_context<P, G, F>(
    mut factory: F,
    config: &Config,
    width: u32,
    height: u32,
) -> Result<ContextManager<P, G>>
where
    P: Platform,
    G: PixelTransfer,
    F: FnMut() -> Result<(P, G)>,
{
    let mut last_error = None;

    for context_type in fallback_ladder(config) {
        if let Some(e) = &last_error {
            warn!("Falling back to {:?} context: {:#}", context_type, e);
        }

        let (platform, gl) = factory().context(UNSUPPORTED_DRIVER)?;
        let mut manager = ContextManager::new(
            platform,
            gl,
            Config {
                context_type,
                ..config.clone()
            },
        );

        if let Err(e) = manager.initialize(width, height) {
            last_error = Some(e);
            continue;
        }

        if !manager.is_viable() {
            last_error = Some(anyhow!(
                "GL version {:?} does not meet the {:?} minimum {:?}",
                manager.gl_version(),
                context_type,
                context_type.min_gl_version()
            ));
            continue;
        }

        manager.set_use_vsync(config.vsync);
        info!(
            "Created {:?} context (GL {:?})",
            context_type,
            manager.gl_version()
        );
        return Ok(manager);
    }

    let error = last_error.unwrap_or_else(|| anyhow!("No context types to try"));
    Err(error.context(UNSUPPORTED_DRIVER))
}
