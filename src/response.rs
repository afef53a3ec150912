//! Normalized outgoing response.
//!
//! Every stage of a call stack receives the [`Response`] produced by the stage
//! before it and returns the one the next stage will see. Setters take `self`
//! by value and return it, so a stage either chains on the input or builds a
//! fresh one.

use serde::Serialize;
use serde_json::Value;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Response::content_type`].
///
/// Engines serialize the body as JSON unless a non-JSON content type is set
/// and the body is a string, in which case the string is sent verbatim.
pub enum ContentType {
    Csv,  // text/csv
    Html, // text/html; charset=utf-8
    Json, // application/json
    Text, // text/plain; charset=utf-8
    Xml,  // application/xml
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv  => "text/csv",
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
            Self::Xml  => "application/xml",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response in engine-neutral form.
///
/// ```rust
/// use keel::Response;
/// use serde_json::json;
///
/// let res = Response::default()
///     .status(201)
///     .header("location", "/users/42")
///     .data(json!({ "id": 42 }));
///
/// assert_eq!(res.status_code(), 201);
/// assert_eq!(res.body(), &json!({ "id": 42 }));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Value,
}

impl Response {
    /// `200 OK`, no headers, `null` body.
    pub fn new() -> Self {
        Self { status: 200, headers: Vec::new(), body: Value::Null }
    }

    /// `200 OK` with a plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new()
            .content_type(ContentType::Text)
            .data(Value::String(body.into()))
    }

    pub fn status(mut self, code: u16) -> Self {
        self.status = code;
        self
    }

    /// Replaces the body with `payload`.
    pub fn data(mut self, payload: impl Into<Value>) -> Self {
        self.body = payload.into();
        self
    }

    /// Replaces the body with any serializable payload.
    pub fn json<T: Serialize + ?Sized>(self, payload: &T) -> Result<Self, serde_json::Error> {
        let value = serde_json::to_value(payload)?;
        Ok(self.data(value))
    }

    /// Sets a header. Names are case-insensitive; setting an existing name
    /// replaces its value in place.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value.to_owned(),
            None => self.headers.push((name.to_ascii_lowercase(), value.to_owned())),
        }
        self
    }

    pub fn content_type(self, content_type: ContentType) -> Self {
        self.header("content-type", content_type.as_str())
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Value { &self.body }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True when the body is `null`, so nothing is written to the wire.
    pub fn is_empty(&self) -> bool {
        self.body.is_null()
    }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_is_empty_ok() {
        let res = Response::default();
        assert_eq!(res.status_code(), 200);
        assert!(res.headers().is_empty());
        assert!(res.is_empty());
    }

    #[test]
    fn header_set_replaces_case_insensitively() {
        let res = Response::new()
            .header("X-Trace", "1")
            .header("x-trace", "2")
            .header("etag", "abc");
        assert_eq!(res.headers(), &[
            ("x-trace".to_owned(), "2".to_owned()),
            ("etag".to_owned(), "abc".to_owned()),
        ]);
        assert_eq!(res.header_value("X-TRACE"), Some("2"));
    }

    #[test]
    fn json_serializes_structs() {
        #[derive(Serialize)]
        struct User { id: u32, name: &'static str }

        let res = Response::new().json(&[User { id: 1, name: "foo" }]).unwrap();
        assert_eq!(res.body(), &json!([{ "id": 1, "name": "foo" }]));
    }

    #[test]
    fn text_sets_content_type() {
        let res = Response::text("ok");
        assert_eq!(res.header_value("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body(), &json!("ok"));
    }
}
