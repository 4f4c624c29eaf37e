//! BLAKE3 integrity hashing for crash-safe writes (§4.7's "integrity hash
//! recorded alongside each write").

use std::io::Read;
use std::path::Path;

/// Hashes bytes or files for `AtomicWriter`'s write-then-verify step.
#[derive(Debug, Default)]
pub struct IntegrityHasher {
    hasher: blake3::Hasher,
}

impl IntegrityHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    #[must_use]
    pub fn finalize(self) -> [u8; 32] {
        *self.hasher.finalize().as_bytes()
    }

    #[must_use]
    pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
        *blake3::hash(data).as_bytes()
    }

    /// # Errors
    /// Returns an I/O error if `path` cannot be opened or read.
    pub fn hash_file(path: &Path) -> std::io::Result<[u8; 32]> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);
        let mut hasher = Self::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize())
    }
}

/// Converts bytes to a lowercase hex string.
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        s.push(HEX[(byte >> 4) as usize] as char);
        s.push(HEX[(byte & 0x0f) as usize] as char);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn hash_bytes_is_deterministic() {
        assert_eq!(
            IntegrityHasher::hash_bytes(b"hello"),
            IntegrityHasher::hash_bytes(b"hello")
        );
        assert_ne!(
            IntegrityHasher::hash_bytes(b"hello"),
            IntegrityHasher::hash_bytes(b"world")
        );
    }

    #[test]
    fn hash_file_matches_hash_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"some content").unwrap();
        file.flush().unwrap();

        let from_file = IntegrityHasher::hash_file(file.path()).unwrap();
        let from_bytes = IntegrityHasher::hash_bytes(b"some content");
        assert_eq!(from_file, from_bytes);
    }

    #[test]
    fn bytes_to_hex_formats_lowercase() {
        assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    }
}
