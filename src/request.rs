//! Normalized incoming request.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::exception::Exception;
use crate::method::Method;

/// An incoming HTTP request in engine-neutral form.
///
/// Built once per inbound call by the engine adapter and shared by every stage
/// of the call stack. It cannot be modified after construction.
pub struct Request {
    raw: Option<Arc<dyn Any + Send + Sync>>,
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl Request {
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Request {
                raw: None,
                method,
                path: path.into(),
                params: Vec::new(),
                headers: Vec::new(),
                body: Bytes::new(),
            },
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn params(&self) -> &[(String, String)] { &self.params }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Deserializes the body as JSON. A malformed body is a `400 Bad Request`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Exception> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Exception::bad_request(format!("invalid JSON body: {e}")))
    }

    /// The engine's native request object, when the engine attached one and
    /// `T` names its type.
    pub fn raw<T: Any>(&self) -> Option<&T> {
        self.raw.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Request`]. Obtain via [`Request::builder`].
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.params.push((key.into(), value.into()));
        self
    }

    /// Appends every pair from `params`, keeping their iteration order.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.request.params.extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.push((name.into(), value.into()));
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.request.headers.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Attaches the engine's native request as an opaque back-reference.
    pub fn raw<T: Any + Send + Sync>(mut self, raw: T) -> Self {
        self.request.raw = Some(Arc::new(raw));
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
