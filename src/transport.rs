// Transport layer: one HTTP request in, one response out.
// - No retries and no request timeout; callers own their retry policy.
// - Streamed bodies are handed to the HTTP stack as readers so a
//   multi-gigabyte video is never held in memory.

use crate::error::{Error, TransportError};
use reqwest::blocking::{Body, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::Read;
use tracing::debug;

/// Which response statuses count as success for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Exactly this status.
    Status(StatusCode),
    /// Any 2xx status.
    Success,
    /// Every status is handed back to the caller, who classifies it.
    Any,
}

impl Expect {
    pub fn accepts(&self, status: StatusCode) -> bool {
        match self {
            Expect::Status(expected) => *expected == status,
            Expect::Success => status.is_success(),
            Expect::Any => true,
        }
    }

    fn describe(&self) -> String {
        match self {
            Expect::Status(expected) => expected.to_string(),
            Expect::Success => "2xx".to_string(),
            Expect::Any => "any status".to_string(),
        }
    }
}

/// Request payload.
pub enum RequestBody {
    Empty,
    /// Small textual payload, e.g. a form-encoded PATCH body.
    Text(String),
    /// Body streamed from a reader; `len` is sent as Content-Length.
    Stream {
        reader: Box<dyn Read + Send>,
        len: u64,
    },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Text(text) => f.debug_tuple("Text").field(text).finish(),
            RequestBody::Stream { len, .. } => f.debug_struct("Stream").field("len", len).finish(),
        }
    }
}

/// A single HTTP exchange to perform.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub expect: Expect,
}

impl Request {
    /// New request with no headers, no body, expecting any 2xx status.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Request {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            expect: Expect::Success,
        }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }
}

/// What came back from the server.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    /// Header value as a string, if present and valid ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decode the body as JSON. `url` is only used for the error message.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Performs HTTP exchanges. Implementations must be shareable across
/// threads so independent uploads can run side by side.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

/// `Transport` backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client without request timeout and without redirect
    /// following: the verification probe answers with 308 and must be seen
    /// as-is.
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(None::<std::time::Duration>)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
            expect,
        } = request;
        debug!(%method, %url, body = ?body, "sending request");

        let network = |source: reqwest::Error| TransportError::Network {
            method: method.clone(),
            url: url.clone(),
            source: Box::new(source),
        };

        let builder = self.client.request(method.clone(), &url).headers(headers);
        let builder = match body {
            // Bodyless PUT/POST/PATCH still need an explicit zero length.
            RequestBody::Empty if method != Method::GET && method != Method::DELETE => {
                builder.body(Vec::<u8>::new())
            }
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Stream { reader, len } => builder.body(Body::sized(reader, len)),
        };

        let response = builder.send().map_err(network)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(network)?.to_vec();
        debug!(%method, %url, %status, "received response");

        if !expect.accepts(status) {
            debug!(body = %String::from_utf8_lossy(&body), "unexpected status body");
            return Err(TransportError::UnexpectedStatus {
                method,
                url,
                actual: status,
                expected: expect.describe(),
            });
        }
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expect_exact_status() {
        let expect = Expect::Status(StatusCode::CREATED);
        assert!(expect.accepts(StatusCode::CREATED));
        assert!(!expect.accepts(StatusCode::OK));
    }

    #[test]
    fn expect_success_range() {
        assert!(Expect::Success.accepts(StatusCode::NO_CONTENT));
        assert!(!Expect::Success.accepts(StatusCode::PERMANENT_REDIRECT));
    }

    #[test]
    fn expect_any_accepts_errors() {
        assert!(Expect::Any.accepts(StatusCode::PERMANENT_REDIRECT));
        assert!(Expect::Any.accepts(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn request_builder_sets_fields() {
        let req = Request::new(Method::PATCH, "http://x/videos/1")
            .header(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(RequestBody::Text("name=a".into()))
            .expect(Expect::Status(StatusCode::OK));
        assert_eq!(req.method, Method::PATCH);
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.expect, Expect::Status(StatusCode::OK));
        assert!(matches!(req.body, RequestBody::Text(ref t) if t == "name=a"));
    }

    #[test]
    fn response_json_decode_error_names_url() {
        let response = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: b"not json".to_vec(),
        };
        let err = response.json::<serde_json::Value>("http://x/me").unwrap_err();
        assert!(err.to_string().contains("http://x/me"));
    }
}
