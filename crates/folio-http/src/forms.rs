//! Public form submissions.
//!
//! Contact messages and newsletter signups are validated and normalized
//! here, then handed to the hosted database through [`SubmissionStore`].
//! Admin login credentials get the same presence check before they go to
//! the identity provider.
//!
//! Fields follow form semantics: a missing, `null`, `false`, `0` or empty
//! value counts as absent; any other JSON value is taken as text.
//!
//! | Endpoint              | Success | Missing fields                              |
//! |-----------------------|---------|---------------------------------------------|
//! | `POST /api/contact`   | 201     | 400 `Name, email, and message are required.` |
//! | `POST /api/newsletter`| 200     | 400 `Email is required.`                    |
//! | `POST /api/auth/login`| -       | 400 `Email and password are required`       |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use folio_core::{IntoResponse, Method, Request, Response, StatusCode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::StoreError;

/// Rejection for a contact message without its required fields.
pub const CONTACT_FIELDS_REQUIRED: &str = "Name, email, and message are required.";

/// Rejection for a newsletter signup without an email.
pub const NEWSLETTER_EMAIL_REQUIRED: &str = "Email is required.";

/// Rejection for a login attempt without credentials.
pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";

/// Status recorded for a newsletter subscriber on signup.
pub const SUBSCRIBER_ACTIVE: &str = "active";

/// Everything that can stop a form submission.
#[derive(Debug)]
pub enum FormError {
    /// Only POST is accepted.
    MethodNotAllowed,
    /// A required field is absent; carries the client-facing message.
    MissingFields(&'static str),
    /// The database rejected the record.
    Store(StoreError),
}

impl FormError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingFields(_) => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MethodNotAllowed => write!(f, "Method not allowed"),
            Self::MissingFields(message) => f.write_str(message),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for FormError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::MethodNotAllowed | Self::MissingFields(_) => None,
        }
    }
}

impl From<StoreError> for FormError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        Response::error(self.status_code(), self.to_string())
    }
}

/// Text of a submitted field, or `None` when the value is falsy.
fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_i64() == Some(0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Raw contact form body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactSubmission {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    email: Option<Value>,
    #[serde(default)]
    subject: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl ContactSubmission {
    /// Check required fields and trim every value.
    ///
    /// A missing subject is stored as `None`.
    pub fn validate(&self) -> Result<ContactMessage, FormError> {
        let missing = || FormError::MissingFields(CONTACT_FIELDS_REQUIRED);
        let name = field_text(self.name.as_ref()).ok_or_else(missing)?;
        let email = field_text(self.email.as_ref()).ok_or_else(missing)?;
        let message = field_text(self.message.as_ref()).ok_or_else(missing)?;
        let subject = field_text(self.subject.as_ref());

        Ok(ContactMessage {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            subject: subject.map(|s| s.trim().to_string()),
            message: message.trim().to_string(),
        })
    }
}

/// A contact message ready to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
    /// Sender name.
    pub name: String,
    /// Sender email.
    pub email: String,
    /// Optional subject line.
    pub subject: Option<String>,
    /// Message text.
    pub message: String,
}

/// Raw newsletter signup body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsletterSignup {
    #[serde(default)]
    email: Option<Value>,
}

impl NewsletterSignup {
    /// Check the email is present; trim and lowercase it.
    pub fn validate(&self) -> Result<Subscriber, FormError> {
        let email = field_text(self.email.as_ref())
            .ok_or(FormError::MissingFields(NEWSLETTER_EMAIL_REQUIRED))?;

        Ok(Subscriber {
            email: email.trim().to_lowercase(),
            status: SUBSCRIBER_ACTIVE.to_string(),
        })
    }
}

/// A newsletter subscriber ready to upsert, keyed by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Normalized email.
    pub email: String,
    /// Subscription status.
    pub status: String,
}

/// Raw admin login body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    email: Option<Value>,
    #[serde(default)]
    password: Option<Value>,
}

impl LoginRequest {
    /// Check both credentials are present. Values are passed on untrimmed.
    pub fn validate(&self) -> Result<Credentials, FormError> {
        let missing = || FormError::MissingFields(LOGIN_FIELDS_REQUIRED);
        Ok(Credentials {
            email: field_text(self.email.as_ref()).ok_or_else(missing)?,
            password: field_text(self.password.as_ref()).ok_or_else(missing)?,
        })
    }
}

/// Login credentials for the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What the database reports back for a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Record id.
    pub id: u64,
    /// Creation time, unix milliseconds.
    pub created_at: u64,
    /// Record status, for records that carry one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Successful submission reply: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReply {
    /// Always `true`.
    pub success: bool,
    /// The stored record.
    pub data: Receipt,
}

/// Seam to the hosted database tables behind the public forms.
pub trait SubmissionStore: Send + Sync {
    /// Insert a contact message.
    fn insert_contact(&self, message: &ContactMessage) -> Result<Receipt, StoreError>;

    /// Insert or reactivate a subscriber; an existing email keeps its id.
    fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<Receipt, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    contacts: Vec<(Receipt, ContactMessage)>,
    subscribers: HashMap<String, Receipt>,
}

impl Tables {
    fn receipt(&mut self, status: Option<String>) -> Receipt {
        self.next_id += 1;
        Receipt {
            id: self.next_id,
            created_at: unix_millis(),
            status,
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// In-process [`SubmissionStore`].
#[derive(Debug, Default)]
pub struct MemorySubmissions {
    tables: Mutex<Tables>,
}

impl MemorySubmissions {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored contact messages, oldest first.
    #[must_use]
    pub fn contacts(&self) -> Vec<ContactMessage> {
        self.tables
            .lock()
            .contacts
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// The subscriber record for `email`.
    #[must_use]
    pub fn subscriber(&self, email: &str) -> Option<Receipt> {
        self.tables.lock().subscribers.get(email).cloned()
    }

    /// Number of distinct subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tables.lock().subscribers.len()
    }
}

impl SubmissionStore for MemorySubmissions {
    fn insert_contact(&self, message: &ContactMessage) -> Result<Receipt, StoreError> {
        let mut tables = self.tables.lock();
        let receipt = tables.receipt(None);
        tables.contacts.push((receipt.clone(), message.clone()));
        Ok(receipt)
    }

    fn upsert_subscriber(&self, subscriber: &Subscriber) -> Result<Receipt, StoreError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.subscribers.get_mut(&subscriber.email) {
            existing.status = Some(subscriber.status.clone());
            return Ok(existing.clone());
        }
        let receipt = tables.receipt(Some(subscriber.status.clone()));
        tables
            .subscribers
            .insert(subscriber.email.clone(), receipt.clone());
        Ok(receipt)
    }
}

/// Decode a JSON request body; an absent or undecodable body reads as `{}`.
fn json_body<T: DeserializeOwned + Default>(request: &Request) -> T {
    let bytes = request.body().as_bytes();
    if bytes.is_empty() {
        return T::default();
    }
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "form body is not a JSON object");
        T::default()
    })
}

fn require_post(request: &Request) -> Result<(), FormError> {
    if request.method() == Method::Post {
        Ok(())
    } else {
        Err(FormError::MethodNotAllowed)
    }
}

/// Validate an admin login request.
///
/// Checking the credentials themselves is the identity provider's job.
pub fn login_credentials(request: &Request) -> Result<Credentials, FormError> {
    require_post(request)?;
    json_body::<LoginRequest>(request).validate()
}

/// Handler for the public contact and newsletter forms.
#[derive(Clone)]
pub struct FormHandler {
    store: Arc<dyn SubmissionStore>,
}

impl std::fmt::Debug for FormHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormHandler").finish_non_exhaustive()
    }
}

impl FormHandler {
    /// Create a handler over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    /// `POST /api/contact`: 201 with the stored record.
    pub fn contact(&self, request: &Request) -> Response {
        let result = require_post(request)
            .and_then(|()| json_body::<ContactSubmission>(request).validate())
            .and_then(|message| {
                self.store
                    .insert_contact(&message)
                    .map_err(FormError::from)
            });
        respond(request, StatusCode::CREATED, result)
    }

    /// `POST /api/newsletter`: 200 with the subscriber record.
    pub fn newsletter(&self, request: &Request) -> Response {
        let result = require_post(request)
            .and_then(|()| json_body::<NewsletterSignup>(request).validate())
            .and_then(|subscriber| {
                self.store
                    .upsert_subscriber(&subscriber)
                    .map_err(FormError::from)
            });
        respond(request, StatusCode::OK, result)
    }
}

fn respond(request: &Request, status: StatusCode, result: Result<Receipt, FormError>) -> Response {
    match result {
        Ok(data) => {
            tracing::info!(path = request.path(), id = data.id, "stored submission");
            Response::json(
                status,
                &SubmissionReply {
                    success: true,
                    data,
                },
            )
        }
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                tracing::error!(path = request.path(), error = %err, "submission failed");
            } else {
                tracing::warn!(path = request.path(), error = %err, "submission rejected");
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn contact(value: Value) -> Result<ContactMessage, FormError> {
        serde_json::from_value::<ContactSubmission>(value)
            .unwrap()
            .validate()
    }

    #[test]
    fn contact_fields_are_trimmed() {
        let message = contact(json!({
            "name": "  Ada ",
            "email": " ada@example.com\n",
            "subject": " Hi ",
            "message": "  hello  ",
        }))
        .unwrap();

        assert_eq!(
            message,
            ContactMessage {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                subject: Some("Hi".into()),
                message: "hello".into(),
            }
        );
    }

    #[test]
    fn contact_subject_is_optional() {
        let message = contact(json!({"name": "A", "email": "a@b.c", "message": "m"})).unwrap();
        assert_eq!(message.subject, None);

        let message =
            contact(json!({"name": "A", "email": "a@b.c", "subject": "", "message": "m"}))
                .unwrap();
        assert_eq!(message.subject, None);
    }

    #[test]
    fn contact_requires_name_email_message() {
        for body in [
            json!({"email": "a@b.c", "message": "m"}),
            json!({"name": "A", "message": "m"}),
            json!({"name": "A", "email": "a@b.c"}),
            json!({"name": "", "email": "a@b.c", "message": "m"}),
            json!({"name": null, "email": "a@b.c", "message": "m"}),
        ] {
            let err = contact(body).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(err.to_string(), CONTACT_FIELDS_REQUIRED);
        }
    }

    #[test]
    fn non_string_values_are_taken_as_text() {
        let message = contact(json!({"name": 42, "email": "a@b.c", "message": true})).unwrap();
        assert_eq!(message.name, "42");
        assert_eq!(message.message, "true");

        assert!(contact(json!({"name": 0, "email": "a@b.c", "message": "m"})).is_err());
        assert!(contact(json!({"name": "A", "email": "a@b.c", "message": false})).is_err());
    }

    #[test]
    fn newsletter_email_is_normalized() {
        let signup: NewsletterSignup =
            serde_json::from_value(json!({"email": "  Ada@Example.COM "})).unwrap();
        let subscriber = signup.validate().unwrap();

        assert_eq!(subscriber.email, "ada@example.com");
        assert_eq!(subscriber.status, SUBSCRIBER_ACTIVE);
    }

    #[test]
    fn newsletter_requires_email() {
        let err = NewsletterSignup::default().validate().unwrap_err();
        assert_eq!(err.to_string(), NEWSLETTER_EMAIL_REQUIRED);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn login_requires_both_fields() {
        let login: LoginRequest =
            serde_json::from_value(json!({"email": " a@b.c ", "password": "pw"})).unwrap();
        let credentials = login.validate().unwrap();
        assert_eq!(credentials.email, " a@b.c ");
        assert_eq!(credentials.password, "pw");

        let login: LoginRequest = serde_json::from_value(json!({"email": "a@b.c"})).unwrap();
        assert_eq!(login.validate().unwrap_err().to_string(), LOGIN_FIELDS_REQUIRED);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            email: "a@b.c".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("a@b.c"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn memory_upsert_keeps_subscriber_id() {
        let store = MemorySubmissions::new();
        let subscriber = Subscriber {
            email: "a@b.c".into(),
            status: SUBSCRIBER_ACTIVE.into(),
        };

        let first = store.upsert_subscriber(&subscriber).unwrap();
        let second = store.upsert_subscriber(&subscriber).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.status.as_deref(), Some(SUBSCRIBER_ACTIVE));
        assert_eq!(store.subscriber_count(), 1);
    }

    #[test]
    fn store_errors_are_server_errors() {
        let err = FormError::from(StoreError::new("relation does not exist"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "relation does not exist");
    }
}
