//! HTTP layer for folio uploads.
//!
//! # Features
//!
//! - Body size limits enforced before multipart extraction
//! - The upload endpoint handler, with JSON error replies
//! - The [`ObjectStore`] seam to the hosted binary store, plus an
//!   in-memory implementation
//! - Validation of the public contact/newsletter forms and admin login,
//!   with the [`SubmissionStore`] seam to the hosted database
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio_http::{MemoryStore, UploadHandler};
//!
//! let store = Arc::new(MemoryStore::new("https://cdn.example.com/images"));
//! let handler = UploadHandler::new(store, Arc::new(my_gate));
//! let response = handler.handle(&request);
//! ```

#![forbid(unsafe_code)]

pub mod body;
pub mod forms;
pub mod storage;
pub mod upload;

pub use body::{
    BodyConfig, BodyError, ContentLengthReader, DEFAULT_MAX_BODY_SIZE, checked_body, limit_body,
    validate_content_length,
};
pub use forms::{
    ContactMessage, ContactSubmission, Credentials, FormError, FormHandler, LoginRequest,
    MemorySubmissions, NewsletterSignup, Receipt, SubmissionReply, SubmissionStore, Subscriber,
    login_credentials,
};
pub use storage::{
    DEFAULT_CACHE_CONTROL, MemoryStore, ObjectStore, PutOptions, StoreError, StoredObject,
};
pub use upload::{
    AdminGate, AuthRejection, ConfigError, ENV_MAX_UPLOAD_BYTES, ENV_UPLOAD_CACHE_CONTROL,
    StoredUpload, UploadConfig, UploadError, UploadHandler, UploadReply, unique_object_name,
};

// Re-export the extractor so the HTTP layer and callers share one implementation.
pub use folio_core::multipart::{
    DEFAULT_CONTENT_TYPE, DEFAULT_FILENAME, ExtractError, ExtractedFile, HEADER_WINDOW,
    MultipartConfig, MultipartExtractor, extract, parse_boundary,
};
