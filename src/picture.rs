// Thumbnail handling for an uploaded video.
// Either upload an image (ticket, one PUT, activation) or pick a frame of
// the processed video by time offset.

use crate::api::{encode_form, ApiClient};
use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::models::{PictureTicket, VideoId};
use crate::progress::BUFFER_SIZE;
use crate::transport::{Expect, Request, RequestBody};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};

/// Where the thumbnail comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureSource<'a> {
    /// Image file to upload.
    File(&'a Path),
    /// Frame at this many seconds into the video.
    Time(u32),
}

pub struct PictureSession<'a> {
    client: &'a ApiClient,
    video: &'a VideoId,
}

impl<'a> PictureSession<'a> {
    pub fn new(client: &'a ApiClient, video: &'a VideoId) -> Self {
        PictureSession { client, video }
    }

    pub fn attach(&self, source: PictureSource<'_>) -> Result<()> {
        match source {
            PictureSource::File(path) => self.upload_file(path),
            PictureSource::Time(seconds) => self.set_from_time(seconds),
        }
    }

    fn pictures_path(&self) -> String {
        format!("/videos/{}/pictures", self.video)
    }

    /// Ticket, transfer, activation.
    pub fn upload_file(&self, path: &Path) -> Result<()> {
        let ticket = self.request_ticket()?;
        self.send_image(&ticket.link, path)?;
        self.activate(&ticket)?;
        info!(video = %self.video, picture = %ticket.uri, "picture activated");
        Ok(())
    }

    pub fn request_ticket(&self) -> Result<PictureTicket> {
        let url = self.client.url(&self.pictures_path());
        let request = Request::new(Method::POST, url.clone())
            .expect(Expect::Status(StatusCode::CREATED));
        self.client.execute(request)?.json(&url)
    }

    /// Whole image in one streamed PUT; pictures are small, so no resume.
    fn send_image(&self, link: &str, path: &Path) -> Result<()> {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let len = file.metadata().map_err(|e| Error::io(path, e))?.len();

        let mut request = Request::new(Method::PUT, link).body(RequestBody::Stream {
            reader: Box::new(BufReader::with_capacity(BUFFER_SIZE, file)),
            len,
        });
        if let Some(mime) = image_mime(path) {
            request = request.header(CONTENT_TYPE, HeaderValue::from_static(mime));
        }
        self.client.execute(request)?;
        Ok(())
    }

    /// Mark the uploaded picture active. The service may still be processing
    /// the image, so failures are retried under the client's activation policy.
    pub fn activate(&self, ticket: &PictureTicket) -> Result<()> {
        let form = encode_form(&[("active", "true")]).unwrap_or_default();
        retry_for(self.client.settings().activation, || {
            let request = self
                .client
                .form_request(Method::PATCH, &ticket.uri, form.clone())
                .expect(Expect::Status(StatusCode::OK));
            self.client.execute(request).map(drop)
        })
    }

    /// Use the frame at `seconds` as thumbnail. No transfer involved.
    pub fn set_from_time(&self, seconds: u32) -> Result<()> {
        let seconds = seconds.to_string();
        let form = encode_form(&[("time", seconds.as_str()), ("active", "true")]).unwrap_or_default();
        let request = self
            .client
            .form_request(Method::POST, &self.pictures_path(), form)
            .expect(Expect::Status(StatusCode::CREATED));
        self.client.execute(request)?;
        info!(video = %self.video, seconds = %seconds, "picture set from video frame");
        Ok(())
    }
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// Run `op` until it succeeds. After a failure, wait `policy.interval` and
/// try again as long as less than `policy.timeout` has passed since the
/// first attempt; otherwise give up with `Error::ActivationTimeout`.
pub(crate) fn retry_for<T>(policy: RetryPolicy, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let started = Instant::now();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                let elapsed = started.elapsed();
                if elapsed >= policy.timeout {
                    return Err(Error::ActivationTimeout {
                        attempts,
                        elapsed,
                        last: Box::new(err),
                    });
                }
                warn!(attempt = attempts, ?elapsed, error = %err, "activation failed, retrying");
                thread::sleep(policy.interval);
            }
        }
    }
}
