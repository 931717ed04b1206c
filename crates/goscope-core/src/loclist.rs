//! `.debug_loc`-style location-list decoding.
//!
//! A variable whose storage moves around as code executes gets a *location
//! list*: a run of `(low, high, expression)` entries, optionally rebased by
//! base-address-selection entries, terminated by an all-zero pair. One buffer
//! backs the lists of every variable in a compilation unit, so the reader is
//! a borrowed cursor that can be `seek`-ed to each variable's list offset and
//! iterated, over and over, without allocating.

use tracing::debug;

/// One decoded location-list entry
///
/// Borrows its expression bytes from the reader's buffer; entries are
/// consumed in stream order and are not independently addressable afterwards
/// (re-`seek` the reader instead).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoclistEntry<'data>
{
    /// Range start, relative to the list's current base address
    pub low_pc: u64,
    /// Range end (exclusive), or the new base for base-address selections
    pub high_pc: u64,
    /// Location expression valid across the range; empty for base selections
    pub instr: &'data [u8],
}

impl LoclistEntry<'_>
{
    /// Returns `true` when this entry selects a new base address instead of
    /// describing storage. `high_pc` then holds the new base and subsequent
    /// ranges are relative to it.
    pub fn is_base_address_selection(&self) -> bool
    {
        self.low_pc == u64::MAX
    }
}

/// Cursor over a raw location-list buffer.
pub struct LoclistReader<'data>
{
    data: &'data [u8],
    cur: usize,
    ptr_size: u8,
}

impl<'data> LoclistReader<'data>
{
    /// Create a reader over `data` for the given pointer width.
    ///
    /// ## Panics
    ///
    /// Panics if `ptr_size` is not 4 or 8. A bad width is a configuration
    /// fault in the caller's setup, not a property of the data.
    pub fn new(data: &'data [u8], ptr_size: u8) -> Self
    {
        assert!(matches!(ptr_size, 4 | 8), "unsupported pointer width: {ptr_size}");
        LoclistReader { data, cur: 0, ptr_size }
    }

    /// Reposition the cursor to the start of a location list.
    ///
    /// Offsets come from the variable's location attribute; several lists
    /// share one buffer.
    pub fn seek(&mut self, offset: usize)
    {
        self.cur = offset;
    }

    /// Decode the next entry.
    ///
    /// Returns `None` on the `(0, 0)` terminator (consuming exactly those
    /// two address-sized values and nothing further) or when the buffer runs
    /// out mid-entry.
    pub fn next(&mut self) -> Option<LoclistEntry<'data>>
    {
        let low_pc = self.one_addr()?;
        let high_pc = self.one_addr()?;

        if low_pc == 0 && high_pc == 0 {
            return None;
        }

        let mut entry = LoclistEntry {
            low_pc,
            high_pc,
            instr: &[],
        };

        if entry.is_base_address_selection() {
            return Some(entry);
        }

        let len_bytes = self.take(2)?;
        let instr_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]);
        entry.instr = self.take(usize::from(instr_len))?;
        Some(entry)
    }

    fn take(&mut self, size: usize) -> Option<&'data [u8]>
    {
        let end = self.cur.checked_add(size)?;
        if end > self.data.len() {
            debug!(
                offset = self.cur,
                wanted = size,
                len = self.data.len(),
                "location list truncated"
            );
            return None;
        }
        let bytes = &self.data[self.cur..end];
        self.cur = end;
        Some(bytes)
    }

    /// Read one address-sized value, widening the 32-bit all-ones sentinel to
    /// the 64-bit one so base-address selections look the same at both widths.
    fn one_addr(&mut self) -> Option<u64>
    {
        let bytes = self.take(usize::from(self.ptr_size))?;
        match self.ptr_size {
            4 => {
                let addr = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if addr == u32::MAX {
                    Some(u64::MAX)
                } else {
                    Some(u64::from(addr))
                }
            }
            8 => Some(u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ])),
            // new() rejects every other width
            _ => unreachable!(),
        }
    }
}
