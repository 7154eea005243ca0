//! Image upload endpoint.
//!
//! `POST /api/upload` takes a `multipart/form-data` body, pulls out the first
//! file, stores it under a generated name and answers `{"url": ...}`.
//!
//! Identity checks and storage are delegated to collaborators behind
//! [`AdminGate`] and [`ObjectStore`]. Every failure becomes a JSON
//! `{"error": ...}` reply:
//!
//! | Failure                     | Status |
//! |-----------------------------|--------|
//! | method other than POST      | 405    |
//! | missing/invalid credentials | 401    |
//! | caller is not an admin      | 403    |
//! | not `multipart/form-data`   | 400    |
//! | body over the size limit    | 413    |
//! | body length mismatch        | 400    |
//! | no file in the body         | 400    |
//! | store rejected the object   | 500    |

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use folio_core::multipart::{MultipartConfig, MultipartExtractor, parse_boundary};
use folio_core::{ExtractError, IntoResponse, Method, Request, Response, StatusCode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::body::{BodyConfig, BodyError, checked_body};
use crate::storage::{DEFAULT_CACHE_CONTROL, ObjectStore, PutOptions, StoreError};

/// Environment variable overriding the upload body limit (bytes).
pub const ENV_MAX_UPLOAD_BYTES: &str = "FOLIO_MAX_UPLOAD_BYTES";

/// Environment variable overriding the cache-control max-age of stored uploads.
pub const ENV_UPLOAD_CACHE_CONTROL: &str = "FOLIO_UPLOAD_CACHE_CONTROL";

/// Length of the random part of generated object names.
const RANDOM_SUFFIX_LEN: usize = 13;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Why the identity collaborator refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No `Authorization` header.
    MissingCredentials,
    /// Token unknown or expired.
    InvalidCredentials,
    /// Authenticated, but not on the admin list.
    NotAdmin,
}

impl AuthRejection {
    /// HTTP status the rejection maps to.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotAdmin => StatusCode::FORBIDDEN,
        }
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::MissingCredentials => "Missing Authorization header",
            Self::InvalidCredentials => "Invalid credentials",
            Self::NotAdmin => "Not authorized",
        }
    }
}

impl std::fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for AuthRejection {}

/// Admin check, delegated to the external identity provider.
pub trait AdminGate: Send + Sync {
    /// Accept or reject the caller of `request`.
    fn authorize(&self, request: &Request) -> Result<(), AuthRejection>;
}

/// Invalid upload configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be used.
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { var, value } => {
                write!(f, "invalid value for {var}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Upload endpoint configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Body size limit.
    body: BodyConfig,
    /// Cache-control max-age recorded with stored objects.
    cache_control: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            body: BodyConfig::default(),
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

impl UploadConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the process environment.
    ///
    /// | Variable | Effect |
    /// |----------|--------|
    /// | `FOLIO_MAX_UPLOAD_BYTES` | Body size limit in bytes |
    /// | `FOLIO_UPLOAD_CACHE_CONTROL` | Cache-control max-age in seconds |
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_MAX_UPLOAD_BYTES) {
            let size = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue {
                    var: ENV_MAX_UPLOAD_BYTES,
                    value: value.clone(),
                })?;
            config = config.max_body_size(size);
        }

        if let Ok(value) = std::env::var(ENV_UPLOAD_CACHE_CONTROL) {
            let seconds = value.trim();
            if seconds.is_empty() || !seconds.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::InvalidValue {
                    var: ENV_UPLOAD_CACHE_CONTROL,
                    value,
                });
            }
            config = config.cache_control(seconds);
        }

        Ok(config)
    }

    /// Set the body size limit.
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.body = self.body.with_max_size(size);
        self
    }

    /// Set the cache-control max-age.
    #[must_use]
    pub fn cache_control(mut self, seconds: impl Into<String>) -> Self {
        self.cache_control = seconds.into();
        self
    }

    /// Get the body configuration.
    #[must_use]
    pub fn body_config(&self) -> &BodyConfig {
        &self.body
    }

    /// Get the cache-control max-age.
    #[must_use]
    pub fn get_cache_control(&self) -> &str {
        &self.cache_control
    }
}

/// Everything that can stop an upload.
#[derive(Debug)]
pub enum UploadError {
    /// Only POST is accepted.
    MethodNotAllowed,
    /// The identity collaborator refused the caller.
    Auth(AuthRejection),
    /// The body broke the size limit or its declared length.
    Body(BodyError),
    /// The body did not contain a usable file.
    Extract(ExtractError),
    /// The object store failed.
    Store(StoreError),
}

impl UploadError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Auth(rejection) => rejection.status_code(),
            Self::Body(err) => err.status_code(),
            Self::Extract(err) => err.status_code(),
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MethodNotAllowed => write!(f, "Method not allowed"),
            Self::Auth(rejection) => write!(f, "{rejection}"),
            Self::Body(err) => write!(f, "{err}"),
            Self::Extract(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "Upload failed: {err}"),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MethodNotAllowed => None,
            Self::Auth(e) => Some(e),
            Self::Body(e) => Some(e),
            Self::Extract(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<AuthRejection> for UploadError {
    fn from(e: AuthRejection) -> Self {
        Self::Auth(e)
    }
}

impl From<BodyError> for UploadError {
    fn from(e: BodyError) -> Self {
        Self::Body(e)
    }
}

impl From<ExtractError> for UploadError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

impl From<StoreError> for UploadError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        Response::error(self.status_code(), self.to_string())
    }
}

/// Successful upload reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReply {
    /// Public URL of the stored file.
    pub url: String,
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Generated object name.
    pub object_name: String,
    /// Public URL issued by the store.
    pub url: String,
}

/// Handler for the upload endpoint.
#[derive(Clone)]
pub struct UploadHandler {
    store: Arc<dyn ObjectStore>,
    gate: Arc<dyn AdminGate>,
    config: UploadConfig,
}

impl std::fmt::Debug for UploadHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UploadHandler {
    /// Create a handler with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, gate: Arc<dyn AdminGate>) -> Self {
        Self::with_config(store, gate, UploadConfig::default())
    }

    /// Create a handler with a custom configuration.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn ObjectStore>,
        gate: Arc<dyn AdminGate>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            gate,
            config,
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Handle a request, turning every outcome into a JSON response.
    pub fn handle(&self, request: &Request) -> Response {
        match self.upload(request) {
            Ok(stored) => Response::json(StatusCode::OK, &UploadReply { url: stored.url }),
            Err(err) => {
                let status = err.status_code();
                if status.is_server_error() {
                    tracing::error!(
                        path = request.path(),
                        status = status.as_u16(),
                        error = %err,
                        "upload failed"
                    );
                } else {
                    tracing::warn!(
                        path = request.path(),
                        method = %request.method(),
                        status = status.as_u16(),
                        error = %err,
                        "upload rejected"
                    );
                }
                err.into_response()
            }
        }
    }

    /// Run the upload pipeline.
    pub fn upload(&self, request: &Request) -> Result<StoredUpload, UploadError> {
        if request.method() != Method::Post {
            return Err(UploadError::MethodNotAllowed);
        }

        self.gate.authorize(request)?;

        // Media type first: a non-multipart request is a 400 whatever its size.
        let boundary = parse_boundary(request.content_type())?;
        let body = checked_body(
            request.headers(),
            request.body().as_bytes(),
            self.config.body_config(),
        )?;
        let file =
            MultipartExtractor::new(boundary, MultipartConfig::default()).extract_from(body)?;

        let object_name = unique_object_name(&file.filename);
        let options =
            PutOptions::new(file.content_type.as_str()).cache_control(self.config.get_cache_control());
        self.store.put(&object_name, file.data, &options)?;

        let url = self.store.public_url(&object_name);
        tracing::info!(
            object = %object_name,
            bytes = file.size(),
            content_type = %file.content_type,
            "stored upload"
        );
        Ok(StoredUpload { object_name, url })
    }
}

/// Generate `<unix-millis>-<random base36>[.<ext>]` for an uploaded filename.
///
/// Only a purely alphanumeric extension survives; the rest of the client's
/// filename is discarded.
#[must_use]
pub fn unique_object_name(filename: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let suffix = random_base36(RANDOM_SUFFIX_LEN);

    match safe_extension(filename) {
        Some(ext) => format!("{millis}-{suffix}.{ext}"),
        None => format!("{millis}-{suffix}"),
    }
}

fn safe_extension(filename: &str) -> Option<&str> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_name_keeps_extension() {
        let name = unique_object_name("holiday photo.JPG");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "JPG");

        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<u128>().is_ok());
        assert_eq!(suffix.len(), RANDOM_SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn object_name_drops_unsafe_extension() {
        for filename in ["upload", "archive.", "../../etc/passwd", "a.png/../x", "evil.p h"] {
            let name = unique_object_name(filename);
            assert!(!name.contains('.'), "{filename} produced {name}");
            assert!(!name.contains('/'));
        }
    }

    #[test]
    fn object_names_differ() {
        assert_ne!(unique_object_name("a.png"), unique_object_name("a.png"));
    }

    #[test]
    fn rejections_map_to_status() {
        assert_eq!(
            AuthRejection::MissingCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthRejection::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthRejection::NotAdmin.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_failure_message() {
        let err = UploadError::from(StoreError::new("bucket not found"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Upload failed: bucket not found");
    }

    #[test]
    fn config_builders() {
        let config = UploadConfig::new().max_body_size(5).cache_control("60");
        assert_eq!(config.body_config().max_size(), 5);
        assert_eq!(config.get_cache_control(), "60");
    }
}
