use std::path::Path;

/// Length of the hex prefix used as a cache key in generated file names.
pub(crate) const KEY_LEN: usize = 7;

/// A 32-byte BLAKE3 hash used for fingerprinting and cache validation.
///
/// Serves two purposes:
/// 1. It identifies the content of every source image, so that a changed
///    image forces the sprite sheet to be rebuilt.
/// 2. Its short hex prefix becomes part of generated file names, so distinct
///    inputs never collide in the cache directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash32([u8; 32]);

impl<T> From<T> for Hash32
where
    T: Into<[u8; 32]>,
{
    fn from(value: T) -> Self {
        Hash32(value.into())
    }
}

impl Hash32 {
    pub fn hash(buffer: impl AsRef<[u8]>) -> Self {
        blake3::Hasher::new()
            .update(buffer.as_ref())
            .finalize()
            .into()
    }

    pub fn hash_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(blake3::Hasher::new()
            .update_mmap_rayon(path)?
            .finalize()
            .into())
    }

    pub fn to_hex(self) -> String {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        let mut acc = String::with_capacity(64);

        for &byte in &self.0 {
            acc.push(HEX[(byte >> 4) as usize] as char);
            acc.push(HEX[(byte & 0xF) as usize] as char);
        }

        acc
    }

    /// Filename-safe short form of the hash.
    pub fn to_key(self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(KEY_LEN);
        hex
    }
}

impl std::fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}
