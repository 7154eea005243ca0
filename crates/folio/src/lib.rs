//! Building blocks for the folio content-management backend.
//!
//! folio backs a blog/portfolio admin: posts, products, portfolio items,
//! contact messages and newsletter signups live in a hosted database, and
//! images go through a single upload endpoint. This workspace owns the part
//! of that backend with real logic in it:
//!
//! - **Multipart extraction**: pull the uploaded file out of a buffered
//!   `multipart/form-data` body
//! - **Upload endpoint**: size limits, admin gate, object naming, storage,
//!   JSON replies
//! - **Public forms**: contact and newsletter validation, login field checks
//!
//! Identity, relational storage and the binary object store are external
//! services reached through traits.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use folio::prelude::*;
//!
//! let store = Arc::new(MemoryStore::new("https://cdn.example.com/images"));
//! let handler = UploadHandler::new(store, Arc::new(my_gate));
//!
//! let request = Request::new(Method::Post, "/api/upload")
//!     .with_header("Content-Type", "multipart/form-data; boundary=XYZ123")
//!     .with_body(body);
//! let response = handler.handle(&request);
//! ```
//!
//! # Crate Structure
//!
//! - [`folio_core`]: multipart extractor, Request/Response types
//! - [`folio_http`]: body limits, object-store seam, upload and form handlers

#![forbid(unsafe_code)]

// Re-export crates
pub use folio_core as core;
pub use folio_http as http;

// Re-export commonly used types
pub use folio_core::{
    Body, ErrorBody, ExtractError, ExtractedFile, Headers, IntoResponse, Method,
    MultipartConfig, MultipartExtractor, Request, Response, StatusCode, UploadFile, extract,
    parse_boundary,
};
pub use folio_http::{
    AdminGate, AuthRejection, BodyConfig, BodyError, FormError, FormHandler, MemoryStore,
    MemorySubmissions, ObjectStore, PutOptions, StoreError, SubmissionStore, UploadConfig,
    UploadError, UploadHandler, UploadReply,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        AdminGate, AuthRejection, BodyConfig, ExtractError, ExtractedFile, FormHandler,
        IntoResponse, MemoryStore, MemorySubmissions, Method, MultipartConfig, ObjectStore,
        PutOptions, Request, Response, StatusCode, StoreError, SubmissionStore, UploadConfig,
        UploadHandler, extract,
    };
    pub use serde::{Deserialize, Serialize};
}

/// Multipart extraction module.
pub mod multipart {
    pub use folio_core::multipart::*;
}
