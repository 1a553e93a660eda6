//! Serialization helpers for control payloads.

/// Serializes a packed C-compatible structure into a byte vector.
///
/// The caller must pass a plain-old-data type with a deterministic layout
/// (typically `#[repr(C, packed)]`).
pub fn serialize<T: Copy>(value: &T) -> Vec<u8> {
    let size = core::mem::size_of::<T>();
    let mut buffer = Vec::with_capacity(size);
    // SAFETY: `T: Copy` plain-old-data, read as exactly `size_of::<T>()` bytes.
    unsafe {
        let src = value as *const T as *const u8;
        let slice = core::slice::from_raw_parts(src, size);
        buffer.extend_from_slice(slice);
    }
    buffer
}
