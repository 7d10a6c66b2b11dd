use anyhow::{Context, Result};
use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::unistd::ftruncate;
use std::ffi::c_void;
use std::fs::OpenOptions;
use std::num::NonZeroUsize;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr::NonNull;

/// A file truncated to an exact size and mapped shared + writable.
///
/// Unmapped on drop, so every exit path releases the mapping.
pub struct SharedMapping {
    ptr: NonNull<c_void>,
    len: usize,
}

impl SharedMapping {
    /// Create (or truncate) `path` to `len` bytes and map it.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        let size = NonZeroUsize::new(len)
            .ok_or_else(|| anyhow::anyhow!("Refusing to map zero bytes at {}", path.display()))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let file_len = nix::libc::off_t::try_from(len).context("Mirror size overflows off_t")?;
        ftruncate(&file, file_len)
            .with_context(|| format!("Failed to size {} to {} bytes", path.display(), len))?;

        let ptr = unsafe {
            mmap(
                None,
                size,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &file,
                0,
            )
        }
        .with_context(|| format!("Failed to map {}", path.display()))?;

        // The mapping stays valid after the descriptor is closed.
        Ok(Self { ptr, len })
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr() as *mut u8, self.len) }
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        let _ = unsafe { munmap(self.ptr, self.len) };
    }
}
