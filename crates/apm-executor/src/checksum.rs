//! Incremental archive hashing and checksum verification.

use crate::source::{ChecksumAlgorithm, ExpectedChecksum};
use apm_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Incrementally hashes a byte stream with every algorithm an
/// `ArchiveSource` might demand, so one pass over the bytes suffices
/// regardless of which checksums were advertised.
pub struct MultiHasher {
    blake3: blake3::Hasher,
    sha256: Sha256,
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiHasher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blake3: blake3::Hasher::new(),
            sha256: Sha256::new(),
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.blake3.update(chunk);
        self.sha256.update(chunk);
    }

    #[must_use]
    pub fn finalize(self) -> ComputedChecksums {
        ComputedChecksums {
            blake3_hex: self.blake3.finalize().to_hex().to_string(),
            sha256_hex: bytes_to_hex(&self.sha256.finalize()),
        }
    }
}

/// The hashes computed over one downloaded archive.
#[derive(Debug, Clone)]
pub struct ComputedChecksums {
    pub blake3_hex: String,
    pub sha256_hex: String,
}

impl ComputedChecksums {
    #[must_use]
    pub fn get_hex(&self, algorithm: ChecksumAlgorithm) -> &str {
        match algorithm {
            ChecksumAlgorithm::Blake3 => &self.blake3_hex,
            ChecksumAlgorithm::Sha256 => &self.sha256_hex,
        }
    }

    /// Verifies every expected checksum against what was actually
    /// computed. Comparison is constant-time per digest to avoid leaking
    /// timing information about where a mismatch occurs.
    ///
    /// # Errors
    /// Returns `Error::download_failed` naming `package` on the first
    /// mismatch.
    pub fn verify(&self, expected: &[ExpectedChecksum], package: &str) -> Result<()> {
        for checksum in expected {
            let actual = self.get_hex(checksum.algorithm);
            if !constant_time_eq(actual.as_bytes(), checksum.hex.as_bytes()) {
                return Err(Error::download_failed(format!(
                    "checksum mismatch for {package}: expected {}, got {actual}",
                    checksum.hex
                )));
            }
        }
        Ok(())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Computes the BLAKE3 digest of a file on disk without loading it
/// entirely into memory.
///
/// # Errors
/// Returns `Error::download_failed` if the file cannot be read.
pub fn blake3_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| Error::download_failed(format!("{}: {e}", path.display())))?;
    let mut hasher = blake3::Hasher::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::download_failed(format!("{}: {e}", path.display())))?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hasher_produces_both_digests() {
        let mut hasher = MultiHasher::new();
        hasher.update(b"hello world");
        let checksums = hasher.finalize();
        assert_eq!(checksums.blake3_hex.len(), 64);
        assert_eq!(checksums.sha256_hex.len(), 64);
    }

    #[test]
    fn verify_rejects_mismatch() {
        let mut hasher = MultiHasher::new();
        hasher.update(b"hello world");
        let checksums = hasher.finalize();

        let expected = vec![ExpectedChecksum {
            algorithm: ChecksumAlgorithm::Blake3,
            hex: "0".repeat(64),
        }];
        let err = checksums.verify(&expected, "vim").unwrap_err();
        assert!(err.to_string().contains("checksum mismatch for vim"));
    }

    #[test]
    fn verify_accepts_match() {
        let mut hasher = MultiHasher::new();
        hasher.update(b"hello world");
        let checksums = hasher.finalize();

        let expected = vec![ExpectedChecksum {
            algorithm: ChecksumAlgorithm::Blake3,
            hex: checksums.blake3_hex.clone(),
        }];
        assert!(checksums.verify(&expected, "vim").is_ok());
    }
}
