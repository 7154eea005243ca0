//! Multipart upload extractor.
//!
//! Pulls a single file out of a fully buffered `multipart/form-data` body.
//! This is not a general form parser: it exists to back the image upload
//! endpoint, and its limits are part of its contract.
//!
//! - Only the first [`HEADER_WINDOW`] bytes of a part are inspected when
//!   deciding whether the part carries a file.
//! - Only the first file-bearing part with a payload is returned; later
//!   files in the same request are ignored.
//! - The filename is returned as sent. Callers must sanitize it before using
//!   it to build storage paths.
//!
//! # Example
//!
//! ```
//! use folio_core::multipart::extract;
//!
//! let body = b"--XYZ123\r\n\
//! Content-Disposition: form-data; name=\"image\"; filename=\"cat.png\"\r\n\
//! Content-Type: image/png\r\n\
//! \r\n\
//! PNGDATA\r\n\
//! --XYZ123--\r\n";
//!
//! let file = extract(body, "multipart/form-data; boundary=XYZ123").unwrap();
//! assert_eq!(file.filename, "cat.png");
//! assert_eq!(file.content_type, "image/png");
//! assert_eq!(file.data, b"PNGDATA");
//! ```

use std::borrow::Cow;
use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;

use crate::response::{IntoResponse, Response, StatusCode};

/// Media type a request must declare to be treated as an upload.
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Filename reported when the part does not declare one.
pub const DEFAULT_FILENAME: &str = "upload";

/// Content type reported when the part does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Number of leading bytes of each part searched for the disposition header.
pub const HEADER_WINDOW: usize = 500;

/// Separates a part's header block from its payload.
const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// CRLF that precedes the next delimiter and is not part of the payload.
const PAYLOAD_TRAILER_LEN: usize = 2;

static FILENAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"filename="([^"]*)""#).expect("filename pattern is valid"));

static CONTENT_TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Content-Type:[ \t]*([^\r\n]+)").expect("content type pattern is valid")
});

/// Configuration for multipart extraction.
#[derive(Debug, Clone)]
pub struct MultipartConfig {
    /// Leading bytes of a part that are searched for file headers.
    header_window: usize,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            header_window: HEADER_WINDOW,
        }
    }
}

impl MultipartConfig {
    /// Create a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the header window.
    #[must_use]
    pub fn header_window(mut self, bytes: usize) -> Self {
        self.header_window = bytes;
        self
    }
}

/// Reasons an upload body could not produce a file.
///
/// All of them are client errors; none is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractError {
    /// The Content-Type header is not `multipart/form-data`.
    UnsupportedMediaType,
    /// The Content-Type header has no usable `boundary=` parameter.
    MissingBoundary,
    /// The body is well formed but no part carries a file payload.
    NoFileFound,
}

impl ExtractError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Client-facing message.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::UnsupportedMediaType => "Content-Type must be multipart/form-data",
            Self::MissingBoundary => "Invalid multipart form data",
            Self::NoFileFound => "No file found in request",
        }
    }
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ExtractError {}

impl IntoResponse for ExtractError {
    fn into_response(self) -> Response {
        Response::error(self.status_code(), self.message())
    }
}

/// A file pulled out of a multipart body.
///
/// `data` borrows from the request body; use [`ExtractedFile::into_owned`]
/// to keep it past the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile<'a> {
    /// Filename declared by the client, or [`DEFAULT_FILENAME`].
    pub filename: String,
    /// Declared media type, or [`DEFAULT_CONTENT_TYPE`].
    pub content_type: String,
    /// Payload bytes.
    pub data: &'a [u8],
}

impl ExtractedFile<'_> {
    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Text after the last `.` of the filename, if there is any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// Copy the payload so the file no longer borrows the request body.
    #[must_use]
    pub fn into_owned(self) -> UploadFile {
        UploadFile {
            filename: self.filename,
            content_type: self.content_type,
            data: self.data.to_vec(),
        }
    }
}

/// An extracted file that owns its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Filename declared by the client, or [`DEFAULT_FILENAME`].
    pub filename: String,
    /// Declared media type, or [`DEFAULT_CONTENT_TYPE`].
    pub content_type: String,
    /// Payload bytes.
    pub data: Vec<u8>,
}

/// Parse the boundary out of a Content-Type header.
///
/// Content-Type format: `multipart/form-data; boundary=----WebKitFormBoundary...`
///
/// The header must contain `multipart/form-data` verbatim. The boundary
/// parameter name is matched case-insensitively and surrounding quotes are
/// dropped.
pub fn parse_boundary(content_type: &str) -> Result<&str, ExtractError> {
    if !content_type.contains(MULTIPART_FORM_DATA) {
        return Err(ExtractError::UnsupportedMediaType);
    }

    for param in content_type.split(';') {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = value.trim().trim_matches('"');
            if boundary.is_empty() {
                return Err(ExtractError::MissingBoundary);
            }
            return Ok(boundary);
        }
    }

    Err(ExtractError::MissingBoundary)
}

/// Extract the first file from a multipart body.
///
/// Uses the default [`MultipartConfig`].
pub fn extract<'a>(body: &'a [u8], content_type: &str) -> Result<ExtractedFile<'a>, ExtractError> {
    let boundary = parse_boundary(content_type)?;
    MultipartExtractor::new(boundary, MultipartConfig::default()).extract_from(body)
}

/// Boundary-bound extractor.
#[derive(Debug, Clone)]
pub struct MultipartExtractor {
    delimiter: memmem::Finder<'static>,
    config: MultipartConfig,
}

impl MultipartExtractor {
    /// Create an extractor for the given boundary token.
    #[must_use]
    pub fn new(boundary: &str, config: MultipartConfig) -> Self {
        let delimiter = format!("--{boundary}");
        Self {
            delimiter: memmem::Finder::new(delimiter.as_bytes()).into_owned(),
            config,
        }
    }

    /// The `--<boundary>` byte sequence parts are split on.
    #[must_use]
    pub fn delimiter(&self) -> &[u8] {
        self.delimiter.needle()
    }

    /// Iterate over the parts of `body` in physical order.
    #[must_use]
    pub fn parts<'b>(&self, body: &'b [u8]) -> Parts<'_, 'b> {
        Parts {
            delimiter: &self.delimiter,
            header_window: self.config.header_window,
            body,
            pos: 0,
            state: ScanState::SeekingDelimiter,
        }
    }

    /// Return the first file-bearing part that has a payload.
    pub fn extract_from<'b>(&self, body: &'b [u8]) -> Result<ExtractedFile<'b>, ExtractError> {
        let mut scanned = 0usize;

        for part in self.parts(body) {
            scanned += 1;
            if !part.is_file_bearing() {
                continue;
            }
            let Some(data) = part.payload() else {
                tracing::debug!(part = scanned, "file part has no payload, skipping");
                continue;
            };

            let headers = part.header_region();
            let filename = FILENAME_PATTERN
                .captures(&headers)
                .and_then(|caps| caps.get(1))
                .map_or(DEFAULT_FILENAME, |m| m.as_str())
                .to_string();
            let content_type = CONTENT_TYPE_PATTERN
                .captures(&headers)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string();

            tracing::debug!(
                part = scanned,
                filename = %filename,
                content_type = %content_type,
                bytes = data.len(),
                "extracted file part"
            );
            return Ok(ExtractedFile {
                filename,
                content_type,
                data,
            });
        }

        tracing::debug!(parts = scanned, "no file part in multipart body");
        Err(ExtractError::NoFileFound)
    }
}

/// A part is file-bearing iff its header window holds both markers.
///
/// Searched on raw bytes: lossy decoding never alters ASCII runs.
fn is_file_bearing(window: &[u8]) -> bool {
    memmem::find(window, b"Content-Disposition").is_some()
        && memmem::find(window, b"filename").is_some()
}

/// One delimiter-bounded segment of a multipart body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part<'b> {
    raw: &'b [u8],
    window: &'b [u8],
    separator: Option<usize>,
    file_bearing: bool,
    payload: Option<&'b [u8]>,
}

impl<'b> Part<'b> {
    /// Bytes strictly between the two delimiters, including the leading CRLF.
    #[must_use]
    pub fn as_bytes(&self) -> &'b [u8] {
        self.raw
    }

    /// Offset of the first CRLF-CRLF inside the part.
    #[must_use]
    pub fn header_end(&self) -> Option<usize> {
        self.separator
    }

    /// The leading header-window bytes, decoded lossily.
    #[must_use]
    pub fn header_region(&self) -> Cow<'b, str> {
        String::from_utf8_lossy(self.window)
    }

    /// Whether `Content-Disposition` and `filename` both occur in the
    /// header window.
    #[must_use]
    pub fn is_file_bearing(&self) -> bool {
        self.file_bearing
    }

    /// Payload after the header separator, without the CRLF that precedes
    /// the next delimiter.
    ///
    /// `None` when the part has no separator or is too short to hold the
    /// trailer.
    #[must_use]
    pub fn payload(&self) -> Option<&'b [u8]> {
        self.payload
    }
}

/// Scanner state over the body index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Looking for the first delimiter; anything before it is preamble.
    SeekingDelimiter,
    /// Just past a delimiter: bound the part, then inspect its header
    /// window and locate the header separator.
    InHeaders,
    /// Headers inspected: cut the payload out and emit the part.
    InPayload {
        start: usize,
        end: usize,
        separator: Option<usize>,
        file_bearing: bool,
    },
    /// No further delimiter.
    Done,
}

/// Iterator over the parts of a multipart body.
///
/// Each part spans the bytes between two consecutive delimiter occurrences,
/// so a body with fewer than two delimiters yields nothing. The closing
/// `--` of the final delimiter is never inspected.
#[derive(Debug)]
pub struct Parts<'d, 'b> {
    delimiter: &'d memmem::Finder<'static>,
    header_window: usize,
    body: &'b [u8],
    pos: usize,
    state: ScanState,
}

impl<'b> Iterator for Parts<'_, 'b> {
    type Item = Part<'b>;

    fn next(&mut self) -> Option<Self::Item> {
        let delimiter_len = self.delimiter.needle().len();

        loop {
            match self.state {
                ScanState::SeekingDelimiter => {
                    let Some(at) = self.delimiter.find(&self.body[self.pos..]) else {
                        self.state = ScanState::Done;
                        continue;
                    };
                    self.pos += at + delimiter_len;
                    self.state = ScanState::InHeaders;
                }
                ScanState::InHeaders => {
                    let start = self.pos;
                    let Some(len) = self.delimiter.find(&self.body[start..]) else {
                        self.state = ScanState::Done;
                        continue;
                    };
                    let end = start + len;
                    let window_end = start + self.header_window.min(len);
                    self.state = ScanState::InPayload {
                        start,
                        end,
                        separator: memmem::find(&self.body[start..end], HEADER_SEPARATOR),
                        file_bearing: is_file_bearing(&self.body[start..window_end]),
                    };
                }
                ScanState::InPayload {
                    start,
                    end,
                    separator,
                    file_bearing,
                } => {
                    let raw = &self.body[start..end];
                    let window = &raw[..self.header_window.min(raw.len())];
                    let payload = separator.and_then(|at| {
                        let from = at + HEADER_SEPARATOR.len();
                        let to = raw.len().checked_sub(PAYLOAD_TRAILER_LEN)?;
                        raw.get(from..to)
                    });

                    self.pos = end + delimiter_len;
                    self.state = ScanState::InHeaders;
                    return Some(Part {
                        raw,
                        window,
                        separator,
                        file_bearing,
                        payload,
                    });
                }
                ScanState::Done => return None,
            }
        }
    }
}
