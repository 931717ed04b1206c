//! Raw memory-read capability.
//!
//! The engine never talks to a process directly; it is handed something that
//! can fill a byte buffer from a target address. Anything works: a ptrace
//! peeker, a core-file mapping, a `HashMap` in tests.

use crate::error::{GoscopeError, Result};

/// Injected raw-memory capability
///
/// Implementations fill `buf` from target memory starting at `addr`, or fail
/// with [`GoscopeError::ReadFailed`]. Short reads are not allowed: either the
/// whole buffer is filled or the call errors.
///
/// The engine performs no writes and assumes the target is halted for the
/// duration of a decode. If the underlying primitive is not safe for
/// concurrent use (most process-introspection primitives are not), callers
/// issuing decodes from multiple threads must serialize access themselves.
pub trait MemoryReader
{
    /// Fill `buf` with the bytes at `addr`
    fn read_memory(&self, buf: &mut [u8], addr: u64) -> Result<()>;
}

/// Read a little-endian unsigned integer of `size` bytes (1, 2, 4, or 8).
pub fn read_uint(mem: &dyn MemoryReader, addr: u64, size: u8) -> Result<u64>
{
    if !matches!(size, 1 | 2 | 4 | 8) {
        return Err(GoscopeError::MalformedDebugInfo(format!(
            "unsupported scalar size {size} at {addr:#x}"
        )));
    }
    let mut buf = [0u8; 8];
    mem.read_memory(&mut buf[..size as usize], addr)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read a pointer-sized word and widen it to 64 bits.
pub fn read_ptr(mem: &dyn MemoryReader, addr: u64, ptr_size: u8) -> Result<u64>
{
    read_uint(mem, addr, ptr_size)
}

/// Sign-extend a raw little-endian load of `size` bytes.
pub(crate) fn sign_extend(raw: u64, size: u8) -> i64
{
    let bits = u32::from(size) * 8;
    if bits >= 64 {
        return raw as i64;
    }
    let shift = 64 - bits;
    ((raw << shift) as i64) >> shift
}
