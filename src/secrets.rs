//! Per-vendor API tokens stored as plain-text files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::Vendor;

/// Directory holding one `{vendor}.token` file per vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretStore {
    dir: PathBuf,
}

impl SecretStore {
    /// Creates a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The token file for `vendor`.
    pub fn token_path(&self, vendor: Vendor) -> PathBuf {
        self.dir.join(format!("{}.token", vendor.name()))
    }

    /// The directory holding the token files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the token for `vendor` with trailing whitespace removed.
    ///
    /// The file is read on every call so that a rotated token is picked up
    /// without restarting.  A missing or unreadable file is a fatal
    /// [`Error::Credentials`].
    pub fn token(&self, vendor: Vendor) -> Result<String> {
        let path = self.token_path(vendor);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(contents.trim().to_string()),
            Err(err) => Err(Error::credentials(vendor.name(), err.to_string(), Some(err))),
        }
    }
}
