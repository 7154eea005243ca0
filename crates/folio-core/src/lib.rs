//! Core types for folio.
//!
//! This crate provides:
//! - The [`multipart`] extractor that pulls a single uploaded file out of a
//!   buffered `multipart/form-data` body
//! - [`Request`] and [`Response`] value types used by the HTTP layer
//! - The [`IntoResponse`] conversion used to turn errors into JSON replies
//!
//! # Design Principles
//!
//! - Zero-copy: extracted payloads borrow from the request body
//! - No shared state; every type is `Send + Sync`
//! - Limits are named constants, not inline literals

#![forbid(unsafe_code)]

pub mod multipart;
mod request;
mod response;

pub use multipart::{
    DEFAULT_CONTENT_TYPE, DEFAULT_FILENAME, ExtractError, ExtractedFile, HEADER_WINDOW,
    MULTIPART_FORM_DATA, MultipartConfig, MultipartExtractor, Part, Parts, UploadFile, extract,
    parse_boundary,
};
pub use request::{Body, Headers, Method, Request};
pub use response::{ErrorBody, IntoResponse, Response, StatusCode};
