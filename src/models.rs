// JSON payloads exchanged with the API. Every field is optional or
// defaulted: the service omits or nulls fields depending on the account
// and on the `fields=` filter of the request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Server-issued handle for one streaming upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadTicket {
    #[serde(rename = "uri")]
    pub resource_uri: String,
    pub ticket_id: String,
    /// Opaque URL that receives the chunk and verification PUTs.
    #[serde(rename = "upload_link_secure")]
    pub upload_endpoint: String,
    pub complete_uri: String,
}

/// Answer to a picture-upload ticket request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PictureTicket {
    pub uri: String,
    #[serde(default)]
    pub active: bool,
    pub link: String,
}

/// Identifier of a video on the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        VideoId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VideoId {
    fn from(id: &str) -> Self {
        VideoId::new(id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paging {
    pub next: Option<String>,
    pub previous: Option<String>,
    pub first: Option<String>,
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Privacy {
    pub view: Option<String>,
    pub embed: Option<String>,
    pub comments: Option<String>,
    pub download: Option<bool>,
    pub add: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub plays: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Video {
    pub uri: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub status: Option<String>,
    pub created_time: Option<String>,
    pub modified_time: Option<String>,
    pub duration: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub privacy: Option<Privacy>,
    pub stats: Option<Stats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoList {
    pub total: Option<u64>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub paging: Option<Paging>,
    pub data: Vec<Video>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSpace {
    pub free: Option<u64>,
    pub max: Option<u64>,
    pub used: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaKinds {
    pub hd: Option<bool>,
    pub sd: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadQuota {
    pub space: Option<QuotaSpace>,
    pub quota: Option<QuotaKinds>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub uri: Option<String>,
    pub options: Option<Vec<String>>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMetadata {
    /// Keyed by connection name (albums, videos, followers, ...).
    pub connections: BTreeMap<String, Option<Connection>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    pub uri: Option<String>,
    pub name: Option<String>,
    pub link: Option<String>,
    pub created_time: Option<String>,
    pub account: Option<String>,
    pub upload_quota: Option<UploadQuota>,
    pub metadata: Option<UserMetadata>,
}
