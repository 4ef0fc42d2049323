//! Path encoding checks between the charset file names use on disk and the
//! charset paths are stored in.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .filter(|ch| *ch != '-' && *ch != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "utf8" => Some(Charset::Utf8),
            "iso88591" | "latin1" | "l1" => Some(Charset::Latin1),
            "usascii" | "ascii" => Some(Charset::Ascii),
            _ => None,
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Charset::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
            Charset::Latin1 => Some(bytes.iter().map(|b| char::from(*b)).collect()),
            Charset::Ascii => {
                if bytes.is_ascii() {
                    std::str::from_utf8(bytes).ok().map(str::to_string)
                } else {
                    None
                }
            }
        }
    }

    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            Charset::Utf8 => Some(text.as_bytes().to_vec()),
            Charset::Latin1 => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)).ok())
                .collect(),
            Charset::Ascii => {
                if text.is_ascii() {
                    Some(text.as_bytes().to_vec())
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingMismatch {
    pub path: String,
    pub converted: Option<String>,
}

/// Converts between on-disk names (`local`) and stored paths (`site`).
#[derive(Clone, Copy, Debug)]
pub struct PathEncoding {
    site: Charset,
    local: Charset,
}

impl PathEncoding {
    pub fn new(site: &str, local: &str) -> Result<Self> {
        let site_charset =
            Charset::from_label(site).ok_or_else(|| CatalogError::UnknownCharset(site.to_string()))?;
        let local_charset = Charset::from_label(local)
            .ok_or_else(|| CatalogError::UnknownCharset(local.to_string()))?;
        Ok(Self {
            site: site_charset,
            local: local_charset,
        })
    }

    /// Returns the stored form of `path`, or a mismatch when the name does not
    /// survive a local -> site -> local round trip byte for byte.
    pub fn to_site(&self, path: &Path) -> Result<String, EncodingMismatch> {
        let raw = path_bytes(path);
        let mismatch = |converted: Option<String>| EncodingMismatch {
            path: path.to_string_lossy().to_string(),
            converted,
        };

        let text = self.local.decode(&raw).ok_or_else(|| mismatch(None))?;
        let site_bytes = self
            .site
            .encode(&text)
            .ok_or_else(|| mismatch(None))?;
        let back = self
            .site
            .decode(&site_bytes)
            .ok_or_else(|| mismatch(None))?;
        match self.local.encode(&back) {
            Some(round) if round == raw => Ok(back),
            _ => Err(mismatch(Some(back))),
        }
    }

    /// On-disk path for a stored path.
    pub fn to_local(&self, stored: &str) -> PathBuf {
        match self.local.encode(stored) {
            Some(bytes) => bytes_to_path(bytes),
            None => PathBuf::from(stored),
        }
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().as_bytes().to_vec()
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(OsString::from(String::from_utf8_lossy(&bytes).to_string()))
}
