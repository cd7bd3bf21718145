//! Counted UTF-16 string buffers.
//!
//! The host's string payload is a single heap buffer of `len + 1` UTF-16
//! code units whose first slot holds the count. These helpers own the
//! allocation discipline for that format; [`crate::Variant`] stores only the
//! raw pointer.

/// Longest representable string, in code units.
pub const MAX_LEN: usize = 0x7FFF;

/// Scan cap for null-terminated imports. Host buffers are counted, so a
/// missing terminator on a foreign pointer must not run away.
pub const SCAN_CAP: usize = 0x4FFF;

/// Encodes UTF-8 into UTF-16 code units.
pub fn encode(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Decodes code units to UTF-8, replacing unpaired surrogates.
pub fn decode(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Allocates a counted buffer holding `units`. `None` when the count
/// exceeds [`MAX_LEN`].
pub(crate) fn alloc_counted(units: &[u16]) -> Option<*mut u16> {
    if units.len() > MAX_LEN {
        return None;
    }
    let mut buf: Vec<u16> = Vec::with_capacity(units.len() + 1);
    buf.push(units.len() as u16);
    buf.extend_from_slice(units);
    Some(Box::into_raw(buf.into_boxed_slice()) as *mut u16)
}

/// Frees a buffer produced by [`alloc_counted`].
///
/// # Safety
/// `p` must come from `alloc_counted`, with its count slot intact, and must
/// not be freed twice.
pub(crate) unsafe fn free_counted(p: *mut u16) {
    let n = unsafe { *p } as usize + 1;
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(p, n)) });
}

/// View of the counted units behind `p`, excluding the count slot.
///
/// # Safety
/// `p` must point at a live counted buffer.
pub(crate) unsafe fn counted_units<'a>(p: *const u16) -> &'a [u16] {
    let n = unsafe { *p } as usize;
    unsafe { std::slice::from_raw_parts(p.add(1), n) }
}

/// Length of a null-terminated buffer, stopping at [`SCAN_CAP`].
///
/// # Safety
/// `p` must be readable up to the terminator or the cap, whichever comes
/// first.
pub(crate) unsafe fn scan_len(p: *const u16) -> usize {
    let mut n = 0usize;
    while n < SCAN_CAP && unsafe { *p.add(n) } != 0 {
        n += 1;
    }
    n
}
