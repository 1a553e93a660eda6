//! Deserialization helpers for raw control payloads.

/// Errors that can happen while interpreting raw bytes as packet structures.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DeserializeError {
    #[error("buffer too short: expected at least {expected} bytes got {actual}")]
    TooShort { expected: usize, actual: usize },
}

/// Reads a packed C-compatible structure from the start of `bytes`.
///
/// Trailing bytes are ignored; the host hands over whole message bodies and
/// only the leading structure is interpreted.
pub fn deserialize_prefix<T: Copy>(bytes: &[u8]) -> Result<T, DeserializeError> {
    let size = core::mem::size_of::<T>();
    if bytes.len() < size {
        return Err(DeserializeError::TooShort {
            expected: size,
            actual: bytes.len(),
        });
    }

    // SAFETY: the length check above guarantees `size` readable bytes and
    // `read_unaligned` tolerates the packed layouts used by this crate.
    unsafe { Ok(core::ptr::read_unaligned(bytes.as_ptr() as *const T)) }
}
