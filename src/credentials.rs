// Bearer credential and its on-disk store.
// The upload core only ever sees a `Credential`; reading and writing the
// token file is the CLI's business.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TOKEN_FILE_NAME: &str = ".vimeo_uploader_token";

/// Opaque bearer token. Cheap to clone; every clone shares the same value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(Arc<str>);

impl Credential {
    /// Wrap a token, trimming surrounding whitespace. Empty tokens are rejected.
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Credential("token is empty".into()));
        }
        Ok(Credential(Arc::from(token)))
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Persists a token into a file so later runs can omit `--token`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store located in the user's home directory, or the current directory
    /// when no home directory is known.
    pub fn in_home() -> Self {
        let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        TokenStore::at(dir.join(TOKEN_FILE_NAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        std::fs::write(&self.path, credential.token()).map_err(|e| Error::io(&self.path, e))
    }

    /// Load a previously saved token. `Ok(None)` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<Credential>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Credential::new(&data).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_trims_and_formats_header() {
        let credential = Credential::new("  abc123\n").unwrap();
        assert_eq!(credential.token(), "abc123");
        assert_eq!(credential.authorization(), "bearer abc123");
    }

    #[test]
    fn credential_rejects_blank() {
        assert!(matches!(Credential::new("   "), Err(Error::Credential(_))));
    }

    #[test]
    fn debug_does_not_leak_token() {
        let credential = Credential::new("secret").unwrap();
        assert!(!format!("{:?}", credential).contains("secret"));
    }

    #[test]
    fn store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::at(dir.path().join("token"));
        assert!(store.load().unwrap().is_none());

        store.save(&Credential::new("tok").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().token(), "tok");
    }
}
