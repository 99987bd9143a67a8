// API client module: holds the transport, the base URL and the bearer
// credential, and exposes every call the CLI needs.
// - The read-only queries (list, details, quota, ...) are one request each.
// - Uploads and pictures are delegated to `UploadSession` and
//   `PictureSession`, which drive several requests through `execute`.

use crate::config::{Config, UploadSettings};
use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::models::{UserInfo, Video, VideoId, VideoList};
use crate::picture::{PictureSession, PictureSource};
use crate::progress::ProgressObserver;
use crate::transport::{Expect, HttpTransport, Request, RequestBody, Response, Transport};
use crate::upload::UploadSession;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Media type pinning the API version every request is written against.
pub const ACCEPT_VERSION: &str = "application/vnd.vimeo.*+json;version=3.2";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Client for the video service. Safe to share between threads; sessions
/// borrow it and only read its credential.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    base_url: String,
    credential: Credential,
    settings: UploadSettings,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: impl Transport + 'static, base_url: &str, credential: Credential) -> Self {
        ApiClient {
            transport: Box::new(transport),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            settings: UploadSettings::default(),
        }
    }

    /// Client talking HTTP to the URL in `config`.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let transport = HttpTransport::new()?;
        Ok(ApiClient::new(transport, &config.api_url, config.credential.clone())
            .with_settings(config.settings))
    }

    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Absolute URL for an API path. Absolute URLs pass through unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// Authorization and Accept headers carried by every request.
    fn auth_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&self.credential.authorization())
            .map_err(|_| Error::InvalidHeader("bearer token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VERSION));
        Ok(headers)
    }

    /// Send `request` with the client's credential attached.
    pub(crate) fn execute(&self, request: Request) -> Result<Response> {
        let request = request.headers(self.auth_headers()?);
        Ok(self.transport.execute(request)?)
    }

    /// Request carrying a form-encoded body.
    pub(crate) fn form_request(&self, method: Method, path: &str, form: String) -> Request {
        Request::new(method, self.url(path))
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(RequestBody::Text(form))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self.execute(
            Request::new(Method::GET, url.clone()).expect(Expect::Status(StatusCode::OK)),
        )?;
        response.json(&url)
    }

    /// Videos of the authenticated user.
    pub fn list_videos(&self) -> Result<VideoList> {
        self.get_json("/me/videos?fields=uri,name,status,created_time,modified_time")
    }

    pub fn video_details(&self, id: &VideoId) -> Result<Video> {
        self.get_json(&format!("/me/videos/{}", id))
    }

    /// Processing status of a video (`available`, `transcoding`, ...).
    pub fn video_status(&self, id: &VideoId) -> Result<Option<String>> {
        let video: Video = self.get_json(&format!("/me/videos/{}?fields=status", id))?;
        Ok(video.status)
    }

    pub fn user_info(&self) -> Result<UserInfo> {
        self.get_json("/me")
    }

    /// User name and upload quota only.
    pub fn quota(&self) -> Result<UserInfo> {
        self.get_json("/me?fields=name,upload_quota")
    }

    pub fn delete_video(&self, id: &VideoId) -> Result<()> {
        self.execute(
            Request::new(Method::DELETE, self.url(&format!("/videos/{}", id)))
                .expect(Expect::Status(StatusCode::NO_CONTENT)),
        )?;
        info!(video = %id, "video deleted");
        Ok(())
    }

    /// Set name and description. Empty values are left out of the patch;
    /// when both are empty no request is made.
    pub fn set_video_metadata(&self, id: &VideoId, name: &str, description: &str) -> Result<()> {
        let Some(form) = encode_form(&[("name", name), ("description", description)]) else {
            debug!(video = %id, "no metadata to set");
            return Ok(());
        };
        let request = self
            .form_request(Method::PATCH, &format!("/videos/{}", id), form)
            .expect(Expect::Status(StatusCode::OK));
        self.execute(request)?;
        info!(video = %id, "metadata updated");
        Ok(())
    }

    /// Upload a video file and return its identifier. Name and description
    /// are applied after completion when non-empty.
    pub fn upload_video(
        &self,
        path: &Path,
        name: &str,
        description: &str,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<VideoId> {
        UploadSession::new(self, path, observer)?
            .with_metadata(name, description)
            .run()
    }

    /// Set the thumbnail of a video from an image file or a time offset.
    pub fn attach_picture(&self, id: &VideoId, source: PictureSource<'_>) -> Result<()> {
        PictureSession::new(self, id).attach(source)
    }
}

/// Join `key=value` pairs with `&`, percent-encoding values and skipping
/// empty ones. `None` when every value is empty.
pub(crate) fn encode_form(fields: &[(&str, &str)]) -> Option<String> {
    let pairs: Vec<String> = fields
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join("&"))
    }
}
