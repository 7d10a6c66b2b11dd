use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use egl_mirror::render::device::list_devices;
use egl_mirror::{
    create_egl_context, Config, ContextType, CopyStrategy, DisplaySource, EglPlatform,
    PixelLayout,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Plain present, nothing mirrored
    Disabled,
    /// Blocking readback before every present
    Sync,
    /// Asynchronous pixel-pack buffer readback, one frame behind
    Pbo,
}

impl From<StrategyArg> for CopyStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Disabled => CopyStrategy::Disabled,
            StrategyArg::Sync => CopyStrategy::Synchronous,
            StrategyArg::Pbo => CopyStrategy::PackBuffer,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    /// RGBA8 color
    Rgba,
    /// f32 depth plane, then RGBA8 color
    DepthRgba,
}

impl From<LayoutArg> for PixelLayout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Rgba => PixelLayout::Rgba,
            LayoutArg::DepthRgba => PixelLayout::DepthRgba,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApiArg {
    Legacy,
    Gles2,
    Gles3,
}

impl From<ApiArg> for ContextType {
    fn from(arg: ApiArg) -> Self {
        match arg {
            ApiArg::Legacy => ContextType::Legacy,
            ApiArg::Gles2 => ContextType::Gles2Compatible,
            ApiArg::Gles3 => ContextType::Gles3Compatible,
        }
    }
}

#[derive(Parser)]
#[command(name = "egl-mirror")]
#[command(about = "Headless EGL renderer with shared-memory frame mirroring")]
struct Cli {
    /// Preferred device (CUDA index); unparseable values mean no preference
    #[arg(long, env = "EGL_CUDA_ID")]
    device: Option<String>,

    /// Use the default EGL display instead of enumerating devices
    #[arg(long)]
    default_display: bool,

    /// File to mirror frames into (e.g. /dev/shm/frame.data)
    #[arg(long, env = "EGL_MIRROR_PATH")]
    mirror: Option<PathBuf>,

    /// Pixel copy strategy
    #[arg(long, value_enum, default_value = "pbo")]
    strategy: StrategyArg,

    /// Mirror file layout
    #[arg(long, value_enum, default_value = "rgba")]
    layout: LayoutArg,

    /// Context API variant
    #[arg(long, value_enum, default_value = "gles3")]
    api: ApiArg,

    /// Fail instead of falling back to a GLES2-compatible context
    #[arg(long)]
    no_fallback: bool,

    /// Request an alpha channel for per-pixel transparency
    #[arg(long)]
    transparent: bool,

    /// Enable vsync
    #[arg(long)]
    vsync: bool,

    /// Surface size as WIDTHxHEIGHT
    #[arg(long, default_value = "96x96", value_parser = parse_size)]
    size: (u32, u32),

    /// Stop after this many frames (runs until Ctrl+C otherwise)
    #[arg(long)]
    frames: Option<u64>,

    /// List EGL devices and exit
    #[arg(short, long)]
    list: bool,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            device_id: self
                .device
                .as_deref()
                .and_then(egl_mirror::config::parse_device_id),
            display_source: if self.default_display {
                DisplaySource::Default
            } else {
                DisplaySource::Device
            },
            context_type: self.api.into(),
            fallback_to_gles2: !self.no_fallback,
            transparent: self.transparent,
            mirror_path: self.mirror.clone().filter(|p| !p.as_os_str().is_empty()),
            copy_strategy: self.strategy.into(),
            pixel_layout: self.layout.into(),
            vsync: self.vsync,
        }
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once('x')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".to_string());
    }
    Ok((w, h))
}

fn list(json: bool) -> Result<()> {
    let platform = EglPlatform::load()?;
    let devices = list_devices(&platform);

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No EGL devices enumerated (default display will be used)");
        return Ok(());
    }
    println!("EGL devices:");
    for device in &devices {
        match device.cuda_id {
            Some(id) => println!("  {} - CUDA device {}", device.position, id),
            None => println!("  {} - no CUDA index", device.position),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list {
        return list(cli.json);
    }

    let config = cli.config();
    let (width, height) = cli.size;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut ctx = create_egl_context(&config, width, height)?;

    if ctx.get_window_width() != width || ctx.get_window_height() != height {
        bail!(
            "Driver created a {}x{} surface instead of {}x{}",
            ctx.get_window_width(),
            ctx.get_window_height(),
            width,
            height
        );
    }

    match ctx.mirror().filter(|m| m.is_active()) {
        Some(mirror) => {
            let frame = mirror.geometry();
            let path = mirror.path().map(|p| p.display().to_string()).unwrap_or_default();
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "path": path,
                        "width": frame.width,
                        "height": frame.height,
                        "layout": format!("{:?}", frame.layout),
                        "bytes_per_pixel": frame.layout.bytes_per_pixel(),
                        "size": frame.size(),
                    })
                );
            } else {
                println!(
                    "Mirroring {}x{} {:?} ({} bytes/pixel) to {}",
                    frame.width,
                    frame.height,
                    frame.layout,
                    frame.layout.bytes_per_pixel(),
                    path
                );
            }
        }
        None => println!("Rendering {}x{} without mirroring", width, height),
    }

    let mut frame: u64 = 0;
    while running.load(Ordering::SeqCst) && cli.frames.map_or(true, |n| frame < n) {
        ctx.make_current()?;

        // Cycle the clear color so consumers can see frames advance.
        let phase = (frame % 256) as f32 / 255.0;
        unsafe {
            gl::ClearColor(phase, 1.0 - phase, 0.5, 1.0);
            gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT);
        }

        ctx.swap_buffers()?;
        frame += 1;
    }

    println!("Rendered {} frames", frame);
    ctx.release_current()?;
    ctx.teardown();
    Ok(())
}
