//! Streams one archive to a scratch file, verifying checksums as it goes.

use crate::checksum::MultiHasher;
use crate::client::HttpClient;
use crate::source::{ArchiveSource, FetchedArchive};
use crate::throttle::BandwidthThrottler;
use apm_core::{Error, Result};
use futures_util::StreamExt;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

/// Streams `source`'s primary URL (the caller is expected to have already
/// exhausted `with_mirrors` fallback if needed) to `dest`, invoking
/// `on_progress(current, total)` as bytes arrive, and verifying every
/// advertised checksum before the temp file is renamed into place.
///
/// # Errors
/// Returns `Error::download_failed` on transport failure or checksum
/// mismatch.
pub async fn download_one(
    client: &HttpClient,
    throttler: &BandwidthThrottler,
    url: &str,
    source: &ArchiveSource,
    dest: &Path,
    verify: bool,
    on_progress: &(dyn Fn(u64, u64) + Send + Sync),
) -> Result<FetchedArchive> {
    let url = Url::parse(url).map_err(|e| Error::invalid_parameters(format!("{url}: {e}")))?;

    debug!(url = %url, dest = %dest.display(), "downloading archive");

    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::download_failed(format!("{}: {e}", parent.display())))?;

    let temp_file = NamedTempFile::new_in(parent)
        .map_err(|e| Error::download_failed(format!("{}: {e}", parent.display())))?;
    let temp_path = temp_file.path().to_path_buf();
    let mut file = tokio::fs::File::from_std(
        temp_file
            .reopen()
            .map_err(|e| Error::download_failed(format!("{}: {e}", temp_path.display())))?,
    );

    let response = client.get(&url).await?;
    let total = response.content_length().unwrap_or(0);

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut hasher = MultiHasher::new();

    on_progress(0, total);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::download_failed(format!("{url}: {e}")))?;

        throttler.acquire(chunk.len()).await;

        file.write_all(&chunk)
            .await
            .map_err(|e| Error::download_failed(format!("{}: {e}", temp_path.display())))?;
        hasher.update(&chunk);

        downloaded += chunk.len() as u64;
        on_progress(downloaded, total.max(downloaded));
    }

    file.flush()
        .await
        .map_err(|e| Error::download_failed(format!("{}: {e}", temp_path.display())))?;
    drop(file);

    let checksums = hasher.finalize();
    if verify {
        checksums.verify(&source.checksums, &source.package_name)?;
    }

    temp_file
        .persist(dest)
        .map_err(|e| Error::download_failed(format!("{}: {e}", dest.display())))?;

    Ok(FetchedArchive {
        package_name: source.package_name.clone(),
        path: dest.to_path_buf(),
        size: downloaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ChecksumAlgorithm, ExpectedChecksum};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_and_verifies_blake3() {
        let server = MockServer::start().await;
        let body = b"archive contents".to_vec();
        let mut hasher = MultiHasher::new();
        hasher.update(&body);
        let checksums = hasher.finalize();

        Mock::given(method("GET"))
            .and(path("/vim.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let client = HttpClient::with_defaults();
        let throttler = BandwidthThrottler::unlimited();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("vim.tar.gz");

        let source = ArchiveSource {
            package_name: "vim".to_string(),
            primary: format!("{}/vim.tar.gz", server.uri()),
            fallbacks: Vec::new(),
            checksums: vec![ExpectedChecksum {
                algorithm: ChecksumAlgorithm::Blake3,
                hex: checksums.blake3_hex,
            }],
            dest_name: "vim.tar.gz".to_string(),
        };

        let result = download_one(
            &client,
            &throttler,
            &source.primary.clone(),
            &source,
            &dest,
            true,
            &|_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(result.size, body.len() as u64);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn checksum_mismatch_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vim.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"archive contents".to_vec()))
            .mount(&server)
            .await;

        let client = HttpClient::with_defaults();
        let throttler = BandwidthThrottler::unlimited();
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("vim.tar.gz");

        let source = ArchiveSource {
            package_name: "vim".to_string(),
            primary: format!("{}/vim.tar.gz", server.uri()),
            fallbacks: Vec::new(),
            checksums: vec![ExpectedChecksum {
                algorithm: ChecksumAlgorithm::Blake3,
                hex: "0".repeat(64),
            }],
            dest_name: "vim.tar.gz".to_string(),
        };

        let err = download_one(
            &client,
            &throttler,
            &source.primary.clone(),
            &source,
            &dest,
            true,
            &|_, _| {},
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }
}
