//! Typed request failures and their mapping onto HTTP responses.
//!
//! Stages fail with [`anyhow::Error`]. When the error is an [`Exception`] it
//! keeps its status code; anything else becomes an
//! [`ExceptionKind::InternalServerError`] carrying the original message.
//!
//! ```rust
//! use keel::{Exception, ExceptionKind};
//!
//! let err = Exception::unauthorized("missing authorization header");
//! assert_eq!(err.status_code(), 401);
//!
//! let untyped = Exception::from(anyhow::anyhow!("boom"));
//! assert_eq!(untyped.kind(), ExceptionKind::InternalServerError);
//! assert_eq!(untyped.message_body(), serde_json::json!({ "message": "boom" }));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::response::Response;

/// The family an [`Exception`] belongs to. Each kind fixes a status code.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ExceptionKind {
    BadRequest,          // 400
    Unauthorized,        // 401
    Forbidden,           // 403
    NotFound,            // 404
    ValidationFailed,    // 422
    InternalServerError, // 500
    NotImplemented,      // 501
    ServiceUnavailable,  // 503
}

impl ExceptionKind {
    pub fn status_code(self) -> u16 {
        match self {
            Self::BadRequest          => 400,
            Self::Unauthorized        => 401,
            Self::Forbidden           => 403,
            Self::NotFound            => 404,
            Self::ValidationFailed    => 422,
            Self::InternalServerError => 500,
            Self::NotImplemented      => 501,
            Self::ServiceUnavailable  => 503,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::BadRequest          => "Bad Request",
            Self::Unauthorized        => "Unauthorized",
            Self::Forbidden           => "Forbidden",
            Self::NotFound            => "Not Found",
            Self::ValidationFailed    => "Unprocessable Content",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented      => "Not Implemented",
            Self::ServiceUnavailable  => "Service Unavailable",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// One field-level failure reported by a validation collaborator.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FieldFailure {
    pub field: String,
    pub message: String,
}

impl FieldFailure {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// A typed request failure: a status-code family plus optional structured data.
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
pub struct Exception {
    kind: ExceptionKind,
    data: Option<Value>,
}

impl Exception {
    pub fn new(kind: ExceptionKind, data: impl Into<Value>) -> Self {
        Self { kind, data: Some(data.into()) }
    }

    pub fn bad_request(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::BadRequest, data)
    }

    pub fn unauthorized(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::Unauthorized, data)
    }

    pub fn forbidden(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::Forbidden, data)
    }

    pub fn not_found(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::NotFound, data)
    }

    /// 422 carrying the list of field failures as its data.
    pub fn validation_failed(failures: Vec<FieldFailure>) -> Self {
        let data = serde_json::to_value(failures).unwrap_or(Value::Null);
        Self { kind: ExceptionKind::ValidationFailed, data: Some(data) }
    }

    pub fn internal(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::InternalServerError, data)
    }

    pub fn not_implemented(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::NotImplemented, data)
    }

    pub fn service_unavailable(data: impl Into<Value>) -> Self {
        Self::new(ExceptionKind::ServiceUnavailable, data)
    }

    pub fn kind(&self) -> ExceptionKind { self.kind }
    pub fn status_code(&self) -> u16 { self.kind.status_code() }

    /// Structured data, if any was attached. `null` and `""` count as absent.
    pub fn data(&self) -> Option<&Value> {
        match &self.data {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(v) => Some(v),
        }
    }

    /// The error envelope: `{"message": data}` or `{"message": "<reason>"}`.
    pub fn message_body(&self) -> Value {
        let message = self.data().cloned().unwrap_or_else(|| Value::String(self.to_string()));
        json!({ "message": message })
    }

    /// Writes this exception onto `response`: status and error envelope.
    /// Headers already set on `response` are kept.
    pub fn respond(&self, response: Response) -> Response {
        response.status(self.status_code()).data(self.message_body())
    }
}

/// An exception with no data; its message is the kind's reason phrase.
impl From<ExceptionKind> for Exception {
    fn from(kind: ExceptionKind) -> Self {
        Self { kind, data: None }
    }
}

/// Typed exceptions pass through unchanged; anything else is wrapped into an
/// internal server error carrying the original message.
impl From<anyhow::Error> for Exception {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Exception>() {
            Ok(exception) => exception,
            Err(other) => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_fix_status_codes() {
        assert_eq!(Exception::bad_request("x").status_code(), 400);
        assert_eq!(Exception::not_found("x").status_code(), 404);
        assert_eq!(Exception::validation_failed(vec![]).status_code(), 422);
        assert_eq!(Exception::internal("x").status_code(), 500);
        assert_eq!(Exception::not_implemented("x").status_code(), 501);
    }

    #[test]
    fn envelope_falls_back_to_reason_phrase() {
        let e = Exception::from(ExceptionKind::NotFound);
        assert_eq!(e.message_body(), json!({ "message": "Not Found" }));

        let e = Exception::not_found("");
        assert_eq!(e.message_body(), json!({ "message": "Not Found" }));
    }

    #[test]
    fn envelope_carries_structured_data() {
        let e = Exception::validation_failed(vec![FieldFailure::new("email", "must not be empty")]);
        assert_eq!(
            e.message_body(),
            json!({ "message": [{ "field": "email", "message": "must not be empty" }] })
        );
    }

    #[test]
    fn typed_exception_survives_anyhow() {
        let err: anyhow::Error = Exception::unauthorized("no token").into();
        let e = Exception::from(err);
        assert_eq!(e.kind(), ExceptionKind::Unauthorized);
        assert_eq!(e.data(), Some(&json!("no token")));
    }

    #[test]
    fn untyped_error_becomes_internal_with_message() {
        let io = std::io::Error::other("disk on fire");
        let e = Exception::from(anyhow::Error::from(io));
        assert_eq!(e.status_code(), 500);
        assert_eq!(e.message_body(), json!({ "message": "disk on fire" }));
    }

    #[test]
    fn respond_keeps_headers() {
        let res = Response::default().header("x-request-id", "abc");
        let res = Exception::unauthorized("nope").respond(res);
        assert_eq!(res.status_code(), 401);
        assert_eq!(res.header_value("x-request-id"), Some("abc"));
        assert_eq!(res.body(), &json!({ "message": "nope" }));
    }
}
