// Runtime configuration: where the API lives, which credential to use and
// the knobs of the upload and picture protocols.

use crate::credentials::{Credential, TokenStore};
use crate::error::{Error, Result};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.vimeo.com";

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two attempts.
    pub interval: Duration,
    /// No new attempt starts once this much time has passed since the first.
    pub timeout: Duration,
}

/// Settings shared by every session created from one `ApiClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSettings {
    /// Consecutive transfer passes without verified progress before giving
    /// up. `None` keeps resuming for as long as it takes.
    pub max_stalled_passes: Option<u32>,
    /// Retry policy for picture activation.
    pub activation: RetryPolicy,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            max_stalled_passes: None,
            activation: RetryPolicy {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(10),
            },
        }
    }
}

/// Fully resolved configuration for one run of the CLI.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub credential: Credential,
    pub settings: UploadSettings,
}

impl Config {
    /// Resolve the credential from an explicit token first, then from the
    /// token store.
    pub fn resolve(api_url: &str, token: Option<&str>, store: &TokenStore) -> Result<Self> {
        let credential = match token {
            Some(token) => Credential::new(token)?,
            None => store.load()?.ok_or_else(|| {
                Error::Credential(format!(
                    "no token given and none saved in {}; pass --token or set VIMEO_TOKEN",
                    store.path().display()
                ))
            })?,
        };
        Ok(Config {
            api_url: api_url.trim_end_matches('/').to_string(),
            credential,
            settings: UploadSettings::default(),
        })
    }
}
