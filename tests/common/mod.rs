// In-process stand-in for the video service. Implements `Transport` so the
// real sessions run against it unchanged, and records what it was sent.

#![allow(dead_code)]

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use std::collections::VecDeque;
use std::io::Read;
use std::sync::{Arc, Mutex};
use vimeo_uploader::config::{RetryPolicy, UploadSettings};
use vimeo_uploader::credentials::Credential;
use vimeo_uploader::transport::{Request, RequestBody, Response, Transport};
use vimeo_uploader::{ApiClient, TransportError};

pub const BASE_URL: &str = "https://api.test";
pub const UPLOAD_LINK: &str = "https://upload.test/ticket-1";
pub const PICTURE_LINK: &str = "https://upload.test/picture-9";
pub const VIDEO_ID: &str = "123456";

/// How the server treats one transfer pass.
#[derive(Debug, Clone, Copy)]
pub enum Pass {
    /// Store the whole body.
    Accept,
    /// Store this many bytes, then drop the connection.
    Drop(usize),
    /// Answer with this status without storing anything.
    Reject(StatusCode),
}

#[derive(Debug, Default)]
pub struct ServerState {
    pub stored: Vec<u8>,
    pub plan: VecDeque<Pass>,
    /// Content-Range of every transfer pass (None on the first).
    pub transfer_ranges: Vec<Option<String>>,
    pub transfer_content_types: Vec<Option<String>>,
    /// Byte offsets implied by the Content-Range of every pass.
    pub transfer_offsets: Vec<u64>,
    pub ticket_calls: usize,
    pub verify_calls: usize,
    pub complete_calls: usize,
    pub patch_bodies: Vec<String>,
    pub picture_posts: Vec<String>,
    pub picture_bytes: Vec<u8>,
    pub activation_calls: usize,
    pub activation_failures: usize,
    /// Answer verification probes with 200 as soon as anything is stored.
    pub ok_when_complete: bool,
    /// Leave the Range header out of verification answers.
    pub omit_range: bool,
    /// Byte counts reported by the next verification answers instead of
    /// what is actually stored.
    pub reported: VecDeque<usize>,
    /// Location header sent on completion.
    pub location: Option<String>,
    pub requests: Vec<(Method, String)>,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    pub state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = FakeServer::default();
        server.state.lock().unwrap().location = Some(format!("/videos/{}", VIDEO_ID));
        server
    }

    pub fn with_plan(plan: &[Pass]) -> Self {
        let server = FakeServer::new();
        server.state.lock().unwrap().plan = plan.iter().copied().collect();
        server
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.clone(), BASE_URL, Credential::new("test-token").unwrap())
    }

    pub fn client_with(&self, settings: UploadSettings) -> ApiClient {
        self.client().with_settings(settings)
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }
}

/// Settings with short activation waits for tests.
pub fn fast_settings(interval_ms: u64, timeout_ms: u64) -> UploadSettings {
    UploadSettings {
        max_stalled_passes: None,
        activation: RetryPolicy {
            interval: std::time::Duration::from_millis(interval_ms),
            timeout: std::time::Duration::from_millis(timeout_ms),
        },
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Read up to `limit` bytes of a streamed body in small pieces, the way a
/// socket would.
fn read_body(body: RequestBody, limit: usize) -> (Vec<u8>, bool) {
    match body {
        RequestBody::Stream { mut reader, .. } => {
            let mut received = Vec::new();
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let room = limit - received.len();
                if room == 0 {
                    return (received, false);
                }
                let take = room.min(buf.len());
                let n = reader.read(&mut buf[..take]).unwrap();
                if n == 0 {
                    return (received, true);
                }
                received.extend_from_slice(&buf[..n]);
            }
        }
        RequestBody::Text(text) => (text.into_bytes(), true),
        RequestBody::Empty => (Vec::new(), true),
    }
}

fn respond(
    request_method: Method,
    url: String,
    expect_ok: bool,
    status: StatusCode,
    headers: HeaderMap,
    body: &str,
) -> Result<Response, TransportError> {
    if !expect_ok {
        return Err(TransportError::UnexpectedStatus {
            method: request_method,
            url,
            actual: status,
            expected: "fake".into(),
        });
    }
    Ok(Response {
        status,
        headers,
        body: body.as_bytes().to_vec(),
    })
}

impl Transport for FakeServer {
    fn execute(&self, request: Request) -> Result<Response, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
            expect,
        } = request;
        let mut state = self.state.lock().unwrap();
        state.requests.push((method.clone(), url.clone()));
        assert_eq!(headers["authorization"], "bearer test-token");

        let reply = |status: StatusCode, headers: HeaderMap, body: &str| {
            respond(method.clone(), url.clone(), expect.accepts(status), status, headers, body)
        };

        let path = url.strip_prefix(BASE_URL).unwrap_or(&url).to_string();
        let picture_uri = format!("/videos/{}/pictures/9", VIDEO_ID);
        let pictures = format!("/videos/{}/pictures", VIDEO_ID);

        match (method.clone(), path.as_str()) {
            (Method::POST, "/me/videos?type=streaming") => {
                assert_eq!(headers["type"], "streaming");
                state.ticket_calls += 1;
                let ticket = format!(
                    r#"{{"uri":"/videos/{id}","ticket_id":"ticket-1","upload_link_secure":"{link}","complete_uri":"/users/1/uploads/ticket-1"}}"#,
                    id = VIDEO_ID,
                    link = UPLOAD_LINK
                );
                reply(StatusCode::CREATED, HeaderMap::new(), &ticket)
            }
            (Method::PUT, UPLOAD_LINK) if header(&headers, "content-range").as_deref() == Some("bytes */*") => {
                assert_eq!(header(&headers, "content-length").as_deref(), Some("0"));
                state.verify_calls += 1;
                let actual = state.stored.len();
                let stored = state.reported.pop_front().unwrap_or(actual);
                if state.ok_when_complete && stored > 0 {
                    return reply(StatusCode::OK, HeaderMap::new(), "");
                }
                let mut out = HeaderMap::new();
                if !state.omit_range && stored > 0 {
                    let range = format!("bytes=0-{}", stored - 1);
                    out.insert("range", HeaderValue::from_str(&range).unwrap());
                }
                reply(StatusCode::PERMANENT_REDIRECT, out, "")
            }
            (Method::PUT, UPLOAD_LINK) => {
                let range = header(&headers, "content-range");
                let offset = range
                    .as_deref()
                    .and_then(|r| r.strip_prefix("bytes "))
                    .and_then(|r| r.split('-').next())
                    .map(|o| o.parse::<u64>().unwrap())
                    .unwrap_or(0);
                state.transfer_ranges.push(range);
                state.transfer_content_types.push(header(&headers, "content-type"));
                state.transfer_offsets.push(offset);
                assert_eq!(offset as usize, state.stored.len(), "resumed away from the stored offset");

                match state.plan.pop_front().unwrap_or(Pass::Accept) {
                    Pass::Accept => {
                        let (bytes, _) = read_body(body, usize::MAX);
                        state.stored.extend_from_slice(&bytes);
                        reply(StatusCode::OK, HeaderMap::new(), "")
                    }
                    Pass::Drop(limit) => {
                        let (bytes, _) = read_body(body, limit);
                        state.stored.extend_from_slice(&bytes);
                        Err(TransportError::Network {
                            method: Method::PUT,
                            url: UPLOAD_LINK.to_string(),
                            source: "connection reset".into(),
                        })
                    }
                    Pass::Reject(status) => reply(status, HeaderMap::new(), ""),
                }
            }
            (Method::DELETE, "/users/1/uploads/ticket-1") => {
                state.complete_calls += 1;
                let mut out = HeaderMap::new();
                if let Some(location) = &state.location {
                    out.insert("location", HeaderValue::from_str(location).unwrap());
                }
                reply(StatusCode::CREATED, out, "")
            }
            (Method::PATCH, p) if p == picture_uri => {
                state.activation_calls += 1;
                let (body, _) = read_body(body, usize::MAX);
                assert_eq!(body, b"active=true");
                if state.activation_failures > 0 {
                    state.activation_failures -= 1;
                    return reply(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), "");
                }
                reply(StatusCode::OK, HeaderMap::new(), "")
            }
            (Method::PATCH, p) if p == format!("/videos/{}", VIDEO_ID) => {
                let (body, _) = read_body(body, usize::MAX);
                state.patch_bodies.push(String::from_utf8(body).unwrap());
                reply(StatusCode::OK, HeaderMap::new(), "")
            }
            (Method::POST, p) if p == pictures => {
                let (body, _) = read_body(body, usize::MAX);
                let body = String::from_utf8(body).unwrap();
                let is_timestamp = !body.is_empty();
                state.picture_posts.push(body);
                if is_timestamp {
                    reply(StatusCode::CREATED, HeaderMap::new(), "{}")
                } else {
                    let json = format!(
                        r#"{{"uri":"{}","active":false,"link":"{}"}}"#,
                        picture_uri, PICTURE_LINK
                    );
                    reply(StatusCode::CREATED, HeaderMap::new(), &json)
                }
            }
            (Method::PUT, PICTURE_LINK) => {
                let (bytes, _) = read_body(body, usize::MAX);
                state.picture_bytes = bytes;
                reply(StatusCode::OK, HeaderMap::new(), "")
            }
            _ => reply(StatusCode::NOT_FOUND, HeaderMap::new(), ""),
        }
    }
}

/// File of `len` bytes with a recognisable pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn write_video(dir: &std::path::Path, name: &str, len: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, pattern(len)).unwrap();
    path
}
