//! Artifact repository client.
//!
//! Talks to an Artifactory-compatible repository manager: an AQL metadata
//! query to enumerate candidate wheels, streamed downloads into the local
//! layout, and checksummed uploads into the publish repository.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use wheelfix_schema::{ArtifactDescriptor, ArtifactEntry, PackageName, Version};

use crate::config::StoreConfig;
use crate::paths::Layout;

/// Header carrying the repository API key.
pub const API_KEY_HEADER: &str = "X-JFrog-Art-Api";

/// Header the repository uses to verify uploaded content.
pub const CHECKSUM_HEADER: &str = "X-Checksum-Sha256";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store configuration: {0}")]
    Config(String),

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Upload of {path} rejected with status {status}: {body}")]
    Rejected {
        path: String,
        status: u16,
        body: String,
    },
}

/// Record of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Path inside the target repository.
    pub path: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    pub status: u16,
}

/// Source and destination for artifact bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Enumerate candidate artifacts in the source repository.
    async fn query(&self) -> Result<Vec<ArtifactEntry>, StoreError>;

    /// Make the artifact available on local disk and return its path.
    /// Idempotent: an already-downloaded file is reused.
    async fn ensure_present(&self, artifact: &ArtifactDescriptor) -> Result<PathBuf, StoreError>;

    /// Publish `file` under the artifact's package/version folder. The
    /// uploaded name is `file`'s own filename, which differs from the
    /// artifact's when a repaired variant is published.
    async fn upload(
        &self,
        file: &Path,
        artifact: &ArtifactDescriptor,
    ) -> Result<UploadReceipt, StoreError>;
}

/// `<root>/<package>/<version>/<filename>`
pub fn upload_path(root: &str, package: &PackageName, version: &Version, filename: &str) -> String {
    let root = root.trim_matches('/');
    if root.is_empty() {
        format!("{package}/{version}/{filename}")
    } else {
        format!("{root}/{package}/{version}/{filename}")
    }
}

/// AQL expression selecting the configured wheels.
pub fn aql_query(config: &StoreConfig) -> String {
    format!(
        r#"items.find({{"repo": "{}","name": {{"$match": "{}"}},"path": {{"$nmatch": "{}"}}}}).include("repo","path","name")"#,
        config.source_repo, config.name_glob, config.path_exclude
    )
}

/// Hex SHA-256 of a file, read in fixed-size chunks.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Deserialize)]
struct AqlResponse {
    #[serde(default)]
    results: Vec<ArtifactEntry>,
}

/// [`ArtifactStore`] backed by the Artifactory REST API.
#[derive(Debug, Clone)]
pub struct ArtifactoryClient {
    client: Client,
    config: StoreConfig,
    layout: Layout,
}

impl ArtifactoryClient {
    /// Build a client. The API key, when set, is attached to every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be constructed.
    pub fn new(config: StoreConfig, layout: Layout) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let mut value = HeaderValue::from_str(&config.api_key)
                .map_err(|_| StoreError::Config("API key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .user_agent(crate::USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            layout,
        })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn artifact_url(&self, entry: &ArtifactEntry) -> String {
        format!("{}/{}", self.base(), entry.location())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), StoreError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut part = dest.as_os_str().to_owned();
        part.push(".part");
        let part = PathBuf::from(part);

        let mut file = File::create(&part).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    tokio::fs::remove_file(&part).await.ok();
                    return Err(e.into());
                }
            };
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&part, dest).await?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for ArtifactoryClient {
    async fn query(&self) -> Result<Vec<ArtifactEntry>, StoreError> {
        let url = self.config.query_url();
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(aql_query(&self.config))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let mut results = response.json::<AqlResponse>().await?.results;
        if self.config.max_total > 0 {
            results.truncate(self.config.max_total);
        }

        tracing::info!(count = results.len(), repo = %self.config.source_repo, "queried artifacts");
        Ok(results)
    }

    async fn ensure_present(&self, artifact: &ArtifactDescriptor) -> Result<PathBuf, StoreError> {
        let dest = self.layout.download_path(artifact.filename());
        if tokio::fs::try_exists(&dest).await? {
            tracing::debug!(path = %dest.display(), "reusing downloaded artifact");
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let url = self.artifact_url(artifact.entry());
        tracing::debug!(%url, "downloading");
        self.download(&url, &dest).await?;
        Ok(dest)
    }

    async fn upload(
        &self,
        file: &Path,
        artifact: &ArtifactDescriptor,
    ) -> Result<UploadReceipt, StoreError> {
        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StoreError::Config(format!("not a file: {}", file.display())))?;

        let path = upload_path(
            &self.config.upload_root,
            artifact.package(),
            artifact.version(),
            &filename,
        );
        let url = format!("{}/{}/{}", self.base(), self.config.target_repo, path);

        let sha256 = sha256_file(file).await?;
        let length = tokio::fs::metadata(file).await?.len();
        let body = reqwest::Body::wrap_stream(ReaderStream::new(File::open(file).await?));

        let response = self
            .client
            .put(&url)
            .header(CHECKSUM_HEADER, &sha256)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                path,
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(%path, "uploaded");
        Ok(UploadReceipt {
            path,
            sha256,
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirConfig;
    use mockito::{Matcher, Server};

    const WHEEL: &str = "foo-1.0-cp311-cp311-linux_ppc64le.whl";

    fn client(base: &str, root: &Path) -> ArtifactoryClient {
        let config = StoreConfig {
            base_url: base.to_string(),
            api_key: "key123".into(),
            source_repo: "pypi-src".into(),
            target_repo: "pypi-dst".into(),
            ..StoreConfig::default()
        };
        ArtifactoryClient::new(config, Layout::rooted(root, &DirConfig::default())).unwrap()
    }

    fn descriptor() -> ArtifactDescriptor {
        ArtifactDescriptor::from_entry(ArtifactEntry {
            repo: "pypi-src".into(),
            path: "foo/1.0".into(),
            name: WHEEL.into(),
        })
        .unwrap()
    }

    #[test]
    fn test_upload_path_layout() {
        let d = descriptor();
        assert_eq!(
            upload_path(
                "auditwheel-repair",
                d.package(),
                d.version(),
                "foo-1.0-cp311-cp311-manylinux_2_34_ppc64le.whl"
            ),
            "auditwheel-repair/foo/1.0/foo-1.0-cp311-cp311-manylinux_2_34_ppc64le.whl"
        );
    }

    #[test]
    fn test_aql_query_shape() {
        let config = StoreConfig {
            source_repo: "pypi-src".into(),
            ..StoreConfig::default()
        };
        assert_eq!(
            aql_query(&config),
            r#"items.find({"repo": "pypi-src","name": {"$match": "*.whl"},"path": {"$nmatch": ".pypi*"}}).include("repo","path","name")"#
        );
    }

    #[tokio::test]
    async fn test_query_parses_and_caps_results() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();

        let _m = server
            .mock("POST", "/api/search/aql")
            .match_header(API_KEY_HEADER, "key123")
            .match_body(Matcher::Regex(r#""repo": "pypi-src""#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"results":[
                    {"repo":"pypi-src","path":"a/1","name":"a-1-py3-none-any.whl"},
                    {"repo":"pypi-src","path":"b/2","name":"b-2-py3-none-any.whl"},
                    {"repo":"pypi-src","path":"c/3","name":"c-3-py3-none-any.whl"}
                ],"range":{"total":3}}"#,
            )
            .create_async()
            .await;

        let mut store = client(&server.url(), tmp.path());
        assert_eq!(store.query().await.unwrap().len(), 3);

        store.config.max_total = 2;
        let capped = store.query().await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].name, "b-2-py3-none-any.whl");
    }

    #[tokio::test]
    async fn test_query_failure_is_an_error() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let _m = server
            .mock("POST", "/api/search/aql")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server.url(), tmp.path()).query().await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_ensure_present_downloads_once() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();

        let m = server
            .mock("GET", format!("/pypi-src/foo/1.0/{WHEEL}").as_str())
            .with_status(200)
            .with_body("wheel-bytes")
            .expect(1)
            .create_async()
            .await;

        let store = client(&server.url(), tmp.path());
        let first = store.ensure_present(&descriptor()).await.unwrap();
        let second = store.ensure_present(&descriptor()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, tmp.path().join("wheels/foo/1.0").join(WHEEL));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "wheel-bytes");
        assert!(!first.with_extension("whl.part").exists());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_artifact_leaves_no_file() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let _m = server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let store = client(&server.url(), tmp.path());
        assert!(store.ensure_present(&descriptor()).await.is_err());
        assert!(!tmp.path().join("wheels/foo/1.0").join(WHEEL).exists());
    }

    #[tokio::test]
    async fn test_upload_sends_checksum() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();

        let file = tmp.path().join("foo-1.0-cp311-cp311-manylinux_2_34_ppc64le.whl");
        std::fs::write(&file, b"repaired").unwrap();
        let digest = hex::encode(Sha256::digest(b"repaired"));

        let _m = server
            .mock(
                "PUT",
                "/pypi-dst/auditwheel-repair/foo/1.0/foo-1.0-cp311-cp311-manylinux_2_34_ppc64le.whl",
            )
            .match_header(CHECKSUM_HEADER, digest.as_str())
            .match_body("repaired")
            .with_status(201)
            .create_async()
            .await;

        let receipt = client(&server.url(), tmp.path())
            .upload(&file, &descriptor())
            .await
            .unwrap();
        assert_eq!(receipt.status, 201);
        assert_eq!(receipt.sha256, digest);
        assert_eq!(
            receipt.path,
            "auditwheel-repair/foo/1.0/foo-1.0-cp311-cp311-manylinux_2_34_ppc64le.whl"
        );
    }

    #[tokio::test]
    async fn test_upload_rejected_status() {
        let mut server = Server::new_async().await;
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join(WHEEL);
        std::fs::write(&file, b"x").unwrap();

        let _m = server
            .mock("PUT", Matcher::Any)
            .with_status(409)
            .with_body("conflict")
            .create_async()
            .await;

        let err = client(&server.url(), tmp.path())
            .upload(&file, &descriptor())
            .await
            .unwrap_err();
        match err {
            StoreError::Rejected { status, body, .. } => {
                assert_eq!(status, 409);
                assert_eq!(body, "conflict");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
