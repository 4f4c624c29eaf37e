//! Archive source description: where one package's distributable archive
//! lives, and how to recognize its format once fetched.

use std::path::PathBuf;

/// Recognized archive container formats. Extraction itself is a backend
/// capability (`install_fetched`); the Execution Driver only needs to
/// recognize the format well enough to name the scratch file sensibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    TarGz,
    TarBz2,
    TarXz,
    TarZst,
    Tar,
}

impl ArchiveType {
    /// Guesses the archive type from a URL or file name.
    #[must_use]
    pub fn from_extension(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".tar.bz2") || lower.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if lower.ends_with(".tar.xz") || lower.ends_with(".txz") {
            Some(Self::TarXz)
        } else if lower.ends_with(".tar.zst") {
            Some(Self::TarZst)
        } else if lower.ends_with(".tar") {
            Some(Self::Tar)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Supported checksum algorithms for archive integrity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Blake3,
    Sha256,
}

/// One checksum the downloaded archive must satisfy.
#[derive(Debug, Clone)]
pub struct ExpectedChecksum {
    pub algorithm: ChecksumAlgorithm,
    pub hex: String,
}

/// Where one package's archive can be fetched from, as reported by the
/// backend's index. `primary` is tried first, then `fallbacks` in order;
/// this is the dist-only case (§4.6's "fetches archives") — there is no
/// VCS or local-path source in this spec.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    pub package_name: String,
    pub primary: String,
    pub fallbacks: Vec<String>,
    pub checksums: Vec<ExpectedChecksum>,
    /// Scratch file name; the archive type is detected from this.
    pub dest_name: String,
}

impl ArchiveSource {
    #[must_use]
    pub fn urls(&self) -> Vec<&str> {
        std::iter::once(self.primary.as_str())
            .chain(self.fallbacks.iter().map(String::as_str))
            .collect()
    }

    #[must_use]
    pub fn archive_type(&self) -> Option<ArchiveType> {
        ArchiveType::from_extension(&self.dest_name)
    }
}

/// The result of successfully fetching one package's archive.
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub package_name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(
            ArchiveType::from_extension("pkg-1.0.tar.gz"),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::from_extension("pkg-1.0.zip"),
            Some(ArchiveType::Zip)
        );
        assert_eq!(ArchiveType::from_extension("pkg-1.0.exe"), None);
    }

    #[test]
    fn urls_puts_primary_first() {
        let source = ArchiveSource {
            package_name: "vim".to_string(),
            primary: "https://a/vim.tar.gz".to_string(),
            fallbacks: vec!["https://b/vim.tar.gz".to_string()],
            checksums: Vec::new(),
            dest_name: "vim.tar.gz".to_string(),
        };
        assert_eq!(
            source.urls(),
            vec!["https://a/vim.tar.gz", "https://b/vim.tar.gz"]
        );
    }
}
