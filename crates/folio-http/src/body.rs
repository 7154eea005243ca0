//! Request body limits.
//!
//! Upload bodies are fully buffered before multipart extraction, so the size
//! cap has to be enforced here, ahead of the extractor:
//! - A declared `Content-Length` above the limit is rejected before the body
//!   is read
//! - A buffered body above the limit is rejected whatever length it declares
//! - A declared length must match the buffered body exactly
//!
//! # Example
//!
//! ```ignore
//! use folio_http::body::{BodyConfig, ContentLengthReader};
//!
//! let config = BodyConfig::default().with_max_size(1024 * 1024);
//! let reader = ContentLengthReader::new(body_bytes, 100, &config)?;
//! let body = reader.read_all_borrowed()?;
//! ```

use folio_core::{Headers, IntoResponse, Response, StatusCode};

/// Default maximum body size (10MB), the cap the upload endpoint has always used.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Configuration for body reading.
#[derive(Debug, Clone)]
pub struct BodyConfig {
    /// Maximum body size in bytes.
    max_size: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl BodyConfig {
    /// Create a new body configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum body size.
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Returns the maximum body size.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Error types for body reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    /// Body exceeds maximum allowed size.
    TooLarge {
        /// The declared or actual size.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },
    /// Fewer bytes arrived than Content-Length declared.
    Incomplete {
        /// Bytes received so far.
        received: usize,
        /// Declared size.
        expected: usize,
    },
    /// More bytes arrived than Content-Length declared.
    ExcessData {
        /// Bytes received.
        received: usize,
        /// Declared size.
        expected: usize,
    },
    /// Content-Length is not a decimal integer.
    InvalidContentLength,
}

impl BodyError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Incomplete { .. } | Self::ExcessData { .. } | Self::InvalidContentLength => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { size, max } => {
                write!(f, "body too large: {size} bytes exceeds limit of {max}")
            }
            Self::Incomplete { received, expected } => {
                write!(f, "incomplete body: received {received} of {expected} bytes")
            }
            Self::ExcessData { received, expected } => {
                write!(f, "body longer than declared: received {received} of {expected} bytes")
            }
            Self::InvalidContentLength => write!(f, "invalid Content-Length header"),
        }
    }
}

impl std::error::Error for BodyError {}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        Response::error(self.status_code(), self.to_string())
    }
}

/// Reads a body with a known Content-Length.
///
/// This reader validates that exactly `length` bytes are provided and
/// enforces the configured size limit.
#[derive(Debug)]
pub struct ContentLengthReader<'a> {
    buffer: &'a [u8],
    length: usize,
}

impl<'a> ContentLengthReader<'a> {
    /// Create a new Content-Length reader.
    ///
    /// # Errors
    ///
    /// Returns `BodyError::TooLarge` if `length` exceeds the configured maximum.
    pub fn new(buffer: &'a [u8], length: usize, config: &BodyConfig) -> Result<Self, BodyError> {
        if length > config.max_size {
            return Err(BodyError::TooLarge {
                size: length,
                max: config.max_size,
            });
        }

        Ok(Self { buffer, length })
    }

    /// Returns the expected body length.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Read all body bytes as a borrowed slice.
    ///
    /// The buffer is the whole request body, so it must hold exactly
    /// `length` bytes.
    ///
    /// # Errors
    ///
    /// Returns `BodyError::Incomplete` if the buffer is short and
    /// `BodyError::ExcessData` if it is long.
    pub fn read_all_borrowed(&self) -> Result<&'a [u8], BodyError> {
        let received = self.buffer.len();
        match received.cmp(&self.length) {
            std::cmp::Ordering::Less => Err(BodyError::Incomplete {
                received,
                expected: self.length,
            }),
            std::cmp::Ordering::Greater => Err(BodyError::ExcessData {
                received,
                expected: self.length,
            }),
            std::cmp::Ordering::Equal => Ok(self.buffer),
        }
    }
}

/// Parse and check the Content-Length header.
///
/// Returns `None` when the header is absent.
pub fn validate_content_length(
    headers: &Headers,
    config: &BodyConfig,
) -> Result<Option<usize>, BodyError> {
    let Some(raw) = headers.get("content-length") else {
        return Ok(None);
    };

    let length = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .ok_or(BodyError::InvalidContentLength)?;

    if length > config.max_size {
        return Err(BodyError::TooLarge {
            size: length,
            max: config.max_size,
        });
    }

    Ok(Some(length))
}

/// Enforce the size limit on an already buffered body.
pub fn limit_body<'a>(body: &'a [u8], config: &BodyConfig) -> Result<&'a [u8], BodyError> {
    if body.len() > config.max_size {
        return Err(BodyError::TooLarge {
            size: body.len(),
            max: config.max_size,
        });
    }
    Ok(body)
}

/// Apply the size limit and, when declared, Content-Length to a request body.
///
/// The limit is checked on both the declared and the buffered size.
pub fn checked_body<'a>(
    headers: &Headers,
    body: &'a [u8],
    config: &BodyConfig,
) -> Result<&'a [u8], BodyError> {
    let declared = validate_content_length(headers, config)?;
    let body = limit_body(body, config)?;
    match declared {
        Some(length) => ContentLengthReader::new(body, length, config)?.read_all_borrowed(),
        None => Ok(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_length(value: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Length", value);
        headers
    }

    #[test]
    fn default_limit_is_ten_megabytes() {
        assert_eq!(BodyConfig::default().max_size(), 10 * 1024 * 1024);
    }

    #[test]
    fn content_length_within_limit() {
        let config = BodyConfig::new().with_max_size(100);
        let reader = ContentLengthReader::new(b"Hello, World!", 13, &config).unwrap();

        assert_eq!(reader.length(), 13);
        assert_eq!(reader.read_all_borrowed().unwrap(), b"Hello, World!");
    }

    #[test]
    fn content_length_too_large() {
        let config = BodyConfig::new().with_max_size(10);
        let result = ContentLengthReader::new(b"0123456789ABCDEF", 16, &config);

        assert!(matches!(
            result,
            Err(BodyError::TooLarge { size: 16, max: 10 })
        ));
    }

    #[test]
    fn content_length_incomplete() {
        let config = BodyConfig::default();
        let reader = ContentLengthReader::new(b"Hello", 10, &config).unwrap();

        assert_eq!(
            reader.read_all_borrowed(),
            Err(BodyError::Incomplete {
                received: 5,
                expected: 10
            })
        );
    }

    #[test]
    fn content_length_rejects_trailing_bytes() {
        let config = BodyConfig::default();
        let reader = ContentLengthReader::new(b"HelloEXTRA", 5, &config).unwrap();

        assert_eq!(
            reader.read_all_borrowed(),
            Err(BodyError::ExcessData {
                received: 10,
                expected: 5
            })
        );
    }

    #[test]
    fn validate_declared_length() {
        let config = BodyConfig::new().with_max_size(1000);

        assert_eq!(
            validate_content_length(&headers_with_length("42"), &config),
            Ok(Some(42))
        );
        assert_eq!(
            validate_content_length(&headers_with_length(" 7 "), &config),
            Ok(Some(7))
        );
        assert_eq!(validate_content_length(&Headers::new(), &config), Ok(None));
        assert_eq!(
            validate_content_length(&headers_with_length("abc"), &config),
            Err(BodyError::InvalidContentLength)
        );
        assert_eq!(
            validate_content_length(&headers_with_length("-1"), &config),
            Err(BodyError::InvalidContentLength)
        );
        assert_eq!(
            validate_content_length(&headers_with_length("5000"), &config),
            Err(BodyError::TooLarge {
                size: 5000,
                max: 1000
            })
        );
    }

    #[test]
    fn limit_body_without_declared_length() {
        let config = BodyConfig::new().with_max_size(4);

        assert_eq!(limit_body(b"abcd", &config), Ok(&b"abcd"[..]));
        assert_eq!(
            limit_body(b"abcde", &config),
            Err(BodyError::TooLarge { size: 5, max: 4 })
        );
    }

    #[test]
    fn checked_body_requires_matching_length() {
        let config = BodyConfig::new().with_max_size(8);

        assert_eq!(
            checked_body(&headers_with_length("6"), b"abcdef", &config),
            Ok(&b"abcdef"[..])
        );
        assert_eq!(
            checked_body(&headers_with_length("3"), b"abcdef", &config),
            Err(BodyError::ExcessData {
                received: 6,
                expected: 3
            })
        );
        assert_eq!(
            checked_body(&headers_with_length("8"), b"abcdef", &config),
            Err(BodyError::Incomplete {
                received: 6,
                expected: 8
            })
        );
        assert_eq!(
            checked_body(&Headers::new(), b"abcdefghij", &config),
            Err(BodyError::TooLarge { size: 10, max: 8 })
        );
    }

    #[test]
    fn checked_body_limits_buffer_despite_small_declared_length() {
        let config = BodyConfig::new().with_max_size(8);

        assert_eq!(
            checked_body(&headers_with_length("3"), b"abcdefghijklmnop", &config),
            Err(BodyError::TooLarge { size: 16, max: 8 })
        );
    }

    #[test]
    fn errors_map_to_status() {
        let too_large = BodyError::TooLarge { size: 2, max: 1 };
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            BodyError::InvalidContentLength.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BodyError::ExcessData {
                received: 4,
                expected: 2
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            too_large.to_string(),
            "body too large: 2 bytes exceeds limit of 1"
        );
    }
}
