// Resumable upload session.
//
// NotStarted -> TicketAcquired -> Transferring <-> Verifying -> Completed
//
// A transfer pass streams the file from the last confirmed offset. Whatever
// happens during the pass, the server is then asked how many bytes it holds
// and the next pass resumes exactly there. Only the verification answer moves
// `bytes_confirmed`; what the client wrote to the socket is never trusted.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{UploadTicket, VideoId};
use crate::progress::{ProgressObserver, ProgressReader, BUFFER_SIZE};
use crate::transport::{Expect, Request, RequestBody, Response};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const VIDEO_CONTENT_TYPE: &str = "video/x-ms-wmv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    TicketAcquired,
    Transferring,
    Verifying,
    Completed,
}

/// Bytes the server has confirmed out of the file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_confirmed: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.bytes_confirmed == self.total_bytes
    }
}

/// What a verification probe told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// 2xx: the server has the whole file.
    Complete,
    /// Non-2xx with a `Range` header: this many bytes are stored.
    Received(u64),
}

impl VerifyOutcome {
    pub fn from_response(response: &Response) -> Result<Self> {
        if response.status.is_success() {
            return Ok(VerifyOutcome::Complete);
        }
        match response.header_str("range") {
            Some(range) => Ok(VerifyOutcome::Received(parse_range(range)?)),
            None => Err(Error::Verification(format!(
                "status {} without a Range header",
                response.status
            ))),
        }
    }
}

/// Number of bytes stored according to a `Range` header such as
/// `bytes=0-1048575` (the upper bound is inclusive).
pub fn parse_range(value: &str) -> Result<u64> {
    let malformed = || Error::Verification(format!("malformed Range header {:?}", value));
    let value_trimmed = value.trim();
    let spec = value_trimmed
        .strip_prefix("bytes=")
        .unwrap_or(value_trimmed);
    let (lower, upper) = spec.split_once('-').ok_or_else(malformed)?;
    lower.trim().parse::<u64>().map_err(|_| malformed())?;
    let upper: u64 = upper.trim().parse().map_err(|_| malformed())?;
    upper.checked_add(1).ok_or_else(malformed)
}

/// Video identifier from a completion `Location` header (`/videos/<id>`).
pub fn parse_location(location: Option<&str>) -> Result<VideoId> {
    let location =
        location.ok_or_else(|| Error::Completion("response has no Location header".into()))?;
    match location.trim().rsplit_once("/videos/") {
        Some((_, id))
            if !id.is_empty() && !id.contains('/') && !id.contains(char::is_whitespace) =>
        {
            Ok(VideoId::new(id))
        }
        _ => Err(Error::Completion(format!(
            "malformed Location header {:?}",
            location
        ))),
    }
}

/// One upload of one file. Owns its ticket, progress and (during a pass)
/// the file handle; borrows the client for requests and credential.
pub struct UploadSession<'a> {
    client: &'a ApiClient,
    path: PathBuf,
    name: String,
    description: String,
    observer: Arc<dyn ProgressObserver>,
    ticket: Option<UploadTicket>,
    progress: UploadProgress,
    state: SessionState,
    passes: u32,
}

impl<'a> UploadSession<'a> {
    /// Prepare a session for `path`. Empty files are rejected.
    pub fn new(client: &'a ApiClient, path: &Path, observer: Arc<dyn ProgressObserver>) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if metadata.len() == 0 {
            return Err(Error::EmptyFile(path.to_path_buf()));
        }
        Ok(UploadSession {
            client,
            path: path.to_path_buf(),
            name: String::new(),
            description: String::new(),
            observer,
            ticket: None,
            progress: UploadProgress {
                bytes_confirmed: 0,
                total_bytes: metadata.len(),
            },
            state: SessionState::NotStarted,
            passes: 0,
        })
    }

    /// Name and description patched onto the video after completion.
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = name.to_string();
        self.description = description.to_string();
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> UploadProgress {
        self.progress
    }

    pub fn ticket(&self) -> Option<&UploadTicket> {
        self.ticket.as_ref()
    }

    /// Transfer passes started so far.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(file = %self.path.display(), from = ?self.state, to = ?state, "upload state");
            self.state = state;
        }
    }

    fn require_ticket(&self) -> Result<&UploadTicket> {
        self.ticket.as_ref().ok_or(Error::MissingTicket)
    }

    /// Request a streaming upload ticket. Only one ticket per session.
    pub fn acquire_ticket(&mut self) -> Result<&UploadTicket> {
        if self.ticket.is_none() {
            let url = self.client.url("/me/videos?type=streaming");
            let request = Request::new(Method::POST, url.clone())
                .header(
                    reqwest::header::HeaderName::from_static("type"),
                    HeaderValue::from_static("streaming"),
                )
                .expect(Expect::Status(StatusCode::CREATED));
            let ticket: UploadTicket = self.client.execute(request)?.json(&url)?;
            info!(ticket = %ticket.ticket_id, bytes = self.progress.total_bytes, "upload ticket acquired");
            self.ticket = Some(ticket);
            self.set_state(SessionState::TicketAcquired);
        }
        self.require_ticket()
    }

    /// One transfer pass from the confirmed offset to the end of the file.
    ///
    /// Failures are logged and absorbed: the verification that follows
    /// decides how far the upload got. A 401/403 is returned instead, since
    /// no amount of resuming fixes a rejected credential.
    pub fn transfer(&mut self) -> Result<()> {
        let endpoint = self.require_ticket()?.upload_endpoint.clone();
        let offset = self.progress.bytes_confirmed;
        self.set_state(SessionState::Transferring);
        self.passes += 1;

        match self.send_from(&endpoint, offset) {
            Ok(()) => debug!(offset, pass = self.passes, "transfer pass finished"),
            Err(Error::Transport(err))
                if matches!(
                    err.status(),
                    Some(status) if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
                ) =>
            {
                return Err(err.into());
            }
            Err(err) => warn!(offset, pass = self.passes, error = %err, "transfer pass failed"),
        }
        Ok(())
    }

    fn send_from(&self, endpoint: &str, offset: u64) -> Result<()> {
        let total = self.progress.total_bytes;
        let mut file = File::open(&self.path).map_err(|e| Error::io(&self.path, e))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io(&self.path, e))?;
        let len = total - offset;

        self.observer.attempt_started(offset, total);
        let reader = ProgressReader::new(
            BufReader::with_capacity(BUFFER_SIZE, file.take(len)),
            len,
            total,
            Arc::clone(&self.observer),
        );

        let mut request = Request::new(Method::PUT, endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static(VIDEO_CONTENT_TYPE))
            .body(RequestBody::Stream {
                reader: Box::new(reader),
                len,
            });
        if offset > 0 {
            let range = format!("bytes {}-{}/{}", offset, total, total);
            let value = HeaderValue::from_str(&range).map_err(|_| Error::InvalidHeader(range))?;
            request = request.header(CONTENT_RANGE, value);
        }
        self.client.execute(request)?;
        Ok(())
    }

    /// Ask the server how many bytes it has stored. Does not send any file
    /// data, so calling it twice in a row yields the same answer.
    pub fn verify(&mut self) -> Result<UploadProgress> {
        let endpoint = self.require_ticket()?.upload_endpoint.clone();
        self.set_state(SessionState::Verifying);

        let request = Request::new(Method::PUT, endpoint)
            .header(CONTENT_LENGTH, HeaderValue::from_static("0"))
            .header(CONTENT_RANGE, HeaderValue::from_static("bytes */*"))
            .expect(Expect::Any);
        let response = self.client.execute(request)?;

        let total = self.progress.total_bytes;
        let confirmed = match VerifyOutcome::from_response(&response)? {
            VerifyOutcome::Complete => total,
            VerifyOutcome::Received(n) => n,
        };
        if confirmed > total {
            return Err(Error::Verification(format!(
                "server reports {} bytes for a {}-byte file",
                confirmed, total
            )));
        }
        if confirmed < self.progress.bytes_confirmed {
            return Err(Error::Verification(format!(
                "confirmed offset went back from {} to {}",
                self.progress.bytes_confirmed, confirmed
            )));
        }
        self.progress.bytes_confirmed = confirmed;
        debug!(confirmed, total, "upload verified");
        Ok(self.progress)
    }

    /// Finalize the upload and return the new video's identifier.
    pub fn complete(&mut self) -> Result<VideoId> {
        if !self.progress.is_complete() {
            return Err(Error::Completion(format!(
                "only {} of {} bytes confirmed",
                self.progress.bytes_confirmed, self.progress.total_bytes
            )));
        }
        let url = self.client.url(&self.require_ticket()?.complete_uri);
        let response = self.client.execute(Request::new(Method::DELETE, url))?;
        let id = parse_location(response.header_str("location"))?;
        self.set_state(SessionState::Completed);
        info!(video = %id, file = %self.path.display(), passes = self.passes, "upload completed");
        Ok(id)
    }

    /// Drive the whole protocol: ticket, transfer/verify until the server has
    /// every byte, completion, then metadata.
    pub fn run(mut self) -> Result<VideoId> {
        self.acquire_ticket()?;
        let max_stalled = self.client.settings().max_stalled_passes;
        let mut stalled = 0;

        while !self.progress.is_complete() {
            let offset = self.progress.bytes_confirmed;
            self.transfer()?;
            let progress = self.verify()?;
            if progress.bytes_confirmed == offset {
                stalled += 1;
                if max_stalled.is_some_and(|max| stalled >= max.max(1)) {
                    return Err(Error::Stalled {
                        offset,
                        passes: stalled,
                    });
                }
            } else {
                stalled = 0;
            }
        }

        let id = self.complete()?;
        self.client
            .set_video_metadata(&id, &self.name, &self.description)?;
        Ok(id)
    }
}
