//! Pixel plane capability
//!
//! The filter hook receives the primary plane's address as an opaque integer
//! handle. Scripts cannot dereference an integer themselves; instead the
//! engine registers a small set of accessor functions that go through a
//! [`PlaneAccess`]:
//!
//! - `plane_len(handle)` - plane size in bytes
//! - `plane_stride(handle)` - bytes per row (may include padding)
//! - `plane_get(handle, offset)` / `plane_set(handle, offset, byte)` - raw bytes
//! - `pixel_get(handle, x, y)` -> `[r, g, b]` / `pixel_set(handle, x, y, r, g, b)`
//!
//! ## Aliasing
//!
//! This is the one place where native memory owned by the pipeline is
//! reachable from the script. A mapping exists only for the duration of a
//! [`PlaneAccess::with_plane`] call, which takes the frame's plane by mutable
//! borrow, so the pipeline cannot touch the buffer while the script can. The
//! mapping is withdrawn before `with_plane` returns or unwinds; no handle to
//! it ever leaves that call, so it cannot outlive the borrow. Every access is
//! checked against the handle and the plane length. Layout is fixed to packed
//! RGB24.

use std::sync::{Arc, RwLock};

/// Bytes per pixel of the only negotiated layout (packed RGB, no alpha).
pub const RGB24_PIXEL_BYTES: usize = 3;

/// Geometry and address of the currently mapped plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneMapping {
    /// Address of the first byte, as handed to the script.
    pub addr: usize,
    /// Length of the plane in bytes.
    pub len: usize,
    /// Bytes per row.
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

impl PlaneMapping {
    /// The opaque handle scripts receive for this plane.
    pub fn handle(&self) -> i64 {
        self.addr as i64
    }

    fn pixel_offset(&self, x: i64, y: i64) -> Result<usize, String> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Err(format!(
                "pixel ({}, {}) outside {}x{} plane",
                x, y, self.width, self.height
            ));
        }
        Ok(y as usize * self.stride + x as usize * RGB24_PIXEL_BYTES)
    }
}

/// Shared capability handle; cloned into every registered accessor function.
#[derive(Debug, Clone, Default)]
pub struct PlaneAccess {
    current: Arc<RwLock<Option<PlaneMapping>>>,
}

impl PlaneAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `plane` while `f` runs, passing it the plane's handle.
    ///
    /// The mapping is withdrawn when `f` returns or panics.
    pub fn with_plane<R>(
        &self,
        plane: &mut [u8],
        stride: usize,
        width: u32,
        height: u32,
        f: impl FnOnce(i64) -> R,
    ) -> R {
        let mapping = PlaneMapping {
            addr: plane.as_mut_ptr() as usize,
            len: plane.len(),
            stride,
            width,
            height,
        };
        self.install(Some(mapping));
        let _mapped = MappedPlane { access: self };
        f(mapping.handle())
    }

    /// The mapping scripts can currently reach, if any.
    pub fn current(&self) -> Option<PlaneMapping> {
        self.current.read().ok().and_then(|m| *m)
    }

    fn install(&self, mapping: Option<PlaneMapping>) {
        match self.current.write() {
            Ok(mut guard) => *guard = mapping,
            Err(poisoned) => *poisoned.into_inner() = mapping,
        }
    }

    /// Run `f` with the mapping for `handle` while holding the read lock.
    fn with_mapping<R>(
        &self,
        handle: i64,
        f: impl FnOnce(&PlaneMapping) -> Result<R, String>,
    ) -> Result<R, String> {
        let guard = self
            .current
            .read()
            .map_err(|e| format!("plane lock poisoned: {}", e))?;
        match guard.as_ref() {
            Some(mapping) if mapping.handle() == handle => f(mapping),
            Some(_) => Err(format!("handle {:#x} is not the mapped plane", handle)),
            None => Err(format!("no plane mapped (handle {:#x})", handle)),
        }
    }

    pub fn byte_len(&self, handle: i64) -> Result<i64, String> {
        self.with_mapping(handle, |m| Ok(m.len as i64))
    }

    pub fn stride(&self, handle: i64) -> Result<i64, String> {
        self.with_mapping(handle, |m| Ok(m.stride as i64))
    }

    pub fn read_byte(&self, handle: i64, offset: i64) -> Result<i64, String> {
        self.with_mapping(handle, |m| {
            let offset = checked_offset(m, offset, 1)?;
            // SAFETY: the mapping is installed only inside `with_plane`, which
            // holds the exclusive borrow of `len` bytes at `addr`; we hold the
            // read lock so it cannot be withdrawn mid-access, and
            // `offset < len` was checked above.
            let byte = unsafe { *(m.addr as *const u8).add(offset) };
            Ok(byte as i64)
        })
    }

    pub fn write_byte(&self, handle: i64, offset: i64, value: i64) -> Result<(), String> {
        self.with_mapping(handle, |m| {
            let offset = checked_offset(m, offset, 1)?;
            // SAFETY: see `read_byte`; the borrow is mutable.
            unsafe { *(m.addr as *mut u8).add(offset) = clamp_byte(value) };
            Ok(())
        })
    }

    pub fn read_pixel(&self, handle: i64, x: i64, y: i64) -> Result<[u8; 3], String> {
        self.with_mapping(handle, |m| {
            let offset = m.pixel_offset(x, y)?;
            checked_offset(m, offset as i64, RGB24_PIXEL_BYTES)?;
            // SAFETY: see `read_byte`; all three bytes are within `len`.
            let px = unsafe {
                let base = (m.addr as *const u8).add(offset);
                [*base, *base.add(1), *base.add(2)]
            };
            Ok(px)
        })
    }

    pub fn write_pixel(&self, handle: i64, x: i64, y: i64, rgb: [i64; 3]) -> Result<(), String> {
        self.with_mapping(handle, |m| {
            let offset = m.pixel_offset(x, y)?;
            checked_offset(m, offset as i64, RGB24_PIXEL_BYTES)?;
            // SAFETY: see `read_byte`; all three bytes are within `len`.
            unsafe {
                let base = (m.addr as *mut u8).add(offset);
                *base = clamp_byte(rgb[0]);
                *base.add(1) = clamp_byte(rgb[1]);
                *base.add(2) = clamp_byte(rgb[2]);
            }
            Ok(())
        })
    }
}

fn checked_offset(m: &PlaneMapping, offset: i64, width: usize) -> Result<usize, String> {
    if offset < 0 || offset as usize + width > m.len {
        return Err(format!(
            "offset {} out of bounds for plane of {} bytes",
            offset, m.len
        ));
    }
    Ok(offset as usize)
}

fn clamp_byte(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// Withdraws the current mapping on drop. Never leaves `with_plane`.
struct MappedPlane<'s> {
    access: &'s PlaneAccess,
}

impl Drop for MappedPlane<'_> {
    fn drop(&mut self) {
        self.access.install(None);
    }
}
