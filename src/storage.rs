use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Presigned upload URLs stay valid for 10 minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// StorageService
///
/// Abstract contract for the object storage layer that holds chapter media
/// (lecture videos, PDF handouts, cover images). The trait lets the real S3
/// client (S3StorageClient) be swapped for the in-memory MockStorageService in
/// tests without affecting the calling handlers.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used primarily in the `Env::Local` setup
    /// to automatically provision the required bucket in MinIO. No-op in production.
    async fn ensure_bucket_exists(&self);

    /// Generates a temporary, cryptographically signed URL allowing a client to upload
    /// a media file directly to the bucket.
    ///
    /// The URL generated includes constraints on expiration time and content type.
    ///
    /// # Arguments
    /// * `key`: The final object key (path + filename) in the bucket.
    /// * `content_type`: The expected MIME type (e.g., "video/mp4").
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String>;
}

/// Accepts the media types a chapter can carry: lecture video, PDF handout,
/// or a cover image. Everything else is refused before a URL is signed.
pub fn allowed_media_type(content_type: &str) -> bool {
    content_type.starts_with("video/")
        || content_type.starts_with("image/")
        || content_type == "application/pdf"
}

/// Builds the object key for a chapter media upload: `chapters/<uuid>.<ext>`.
/// The extension comes from the client filename but the path does not, so a
/// hostile filename cannot place the object outside the chapters prefix.
pub fn media_object_key(filename: &str) -> String {
    let safe_name = sanitize_key(filename);
    let extension = std::path::Path::new(&safe_name)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin");
    format!("chapters/{}.{}", Uuid::new_v4(), extension)
}

/// S3StorageClient
///
/// The concrete implementation using the AWS SDK for S3. Due to S3 compatibility,
/// this client transparently handles connections to:
/// - **Local:** Dockerized MinIO instance.
/// - **Production:** Any S3-compatible storage endpoint.
///
/// The `force_path_style(true)` is critical for MinIO compatibility.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    /// Constructs the S3 client using credentials and configuration from AppConfig.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Path-style addressing (http://endpoint/bucket/key) is required
            // for MinIO and similar S3 gateways.
            .force_path_style(true)
            .build();

        let client = s3::Client::from_conf(config);

        Self {
            client,
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Calls the S3 CreateBucket API. The call is idempotent, so it only
    /// creates the bucket if it does not already exist. Safe at startup.
    async fn ensure_bucket_exists(&self) {
        let _ = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await;
    }

    /// Signs a PUT for the given key, constrained to the declared media type.
    /// The Content-Type constraint means a client granted a URL for a video
    /// cannot use it to store something else.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, String> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| format!("presigning config: {e}"))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| e.to_string())?;

        Ok(presigned_req.uri().to_string())
    }
}

/// sanitize_key
///
/// Utility function to prevent path traversal attacks by removing directory
/// navigation components (e.g., `..`, `.`) from a user-provided key segment.
fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// A mock implementation of `StorageService` used exclusively for unit and integration testing.
/// This allows us to test the upload handler logic without requiring a network
/// connection to S3, isolating the test boundary.
#[derive(Clone)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockStorageService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {
        // No-op in mock environment.
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, String> {
        if self.should_fail {
            return Err("Mock Storage Error: Simulation requested".to_string());
        }

        let sanitized_key = sanitize_key(key);

        // Returns a deterministic, local-style URL for mock assertions.
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitized_key
        ))
    }
}

/// StorageState
///
/// The concrete type used to share the storage service access across the application state.
pub type StorageState = Arc<dyn StorageService>;
