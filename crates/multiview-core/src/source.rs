//! Stream locators
//!
//! Catalog entries carry either an absolute URL or a root-relative path
//! (`/hls/stream1/index.m3u8`) that the embedding page resolves against its
//! own origin. [`StreamSource`] keeps the locator as given and, when a base
//! URL is known, the resolved absolute URL.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// MIME type probed for native HLS playback
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// Manifest types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestType {
    Hls,
    Dash,
    Unknown,
}

/// Detect manifest type from a locator path or manifest content
pub fn detect_manifest_type(path: &str, content: Option<&str>) -> ManifestType {
    // Check extension first
    let path = path.split(['?', '#']).next().unwrap_or_default().to_lowercase();
    if path.ends_with(".m3u8") || path.ends_with(".m3u") {
        return ManifestType::Hls;
    }
    if path.ends_with(".mpd") {
        return ManifestType::Dash;
    }

    // Check content if available
    if let Some(content) = content {
        if content.contains("#EXTM3U") {
            return ManifestType::Hls;
        }
        if content.contains("<MPD") || content.contains("urn:mpeg:dash") {
            return ManifestType::Dash;
        }
    }

    ManifestType::Unknown
}

/// A validated stream locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    /// Locator exactly as it appeared in the catalog
    locator: String,
    /// Absolute URL, when the locator is absolute or a base was supplied
    resolved: Option<Url>,
}

impl StreamSource {
    /// Parse a locator without a base. Root-relative locators stay unresolved.
    pub fn parse(locator: &str) -> Result<Self> {
        Self::parse_with_base(locator, None)
    }

    /// Parse a locator, resolving root-relative paths against `base`
    pub fn parse_with_base(locator: &str, base: Option<&Url>) -> Result<Self> {
        let trimmed = locator.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLocator {
                locator: locator.to_string(),
                reason: "empty locator".into(),
            });
        }

        if trimmed.starts_with('/') && !trimmed.starts_with("//") {
            let resolved = match base {
                Some(base) => Some(base.join(trimmed).map_err(|e| Error::InvalidLocator {
                    locator: locator.to_string(),
                    reason: e.to_string(),
                })?),
                None => None,
            };
            return Ok(Self {
                locator: trimmed.to_string(),
                resolved,
            });
        }

        let url = Url::parse(trimmed).map_err(|e| Error::InvalidLocator {
            locator: locator.to_string(),
            reason: format!("expected absolute URL or root-relative path ({e})"),
        })?;

        Ok(Self {
            locator: trimmed.to_string(),
            resolved: Some(url),
        })
    }

    /// Locator as given by the catalog
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Resolved absolute URL, if any
    pub fn url(&self) -> Option<&Url> {
        self.resolved.as_ref()
    }

    /// The string handed to a playback engine
    pub fn as_str(&self) -> &str {
        self.resolved
            .as_ref()
            .map(Url::as_str)
            .unwrap_or(self.locator.as_str())
    }

    pub fn is_root_relative(&self) -> bool {
        self.locator.starts_with('/')
    }

    pub fn manifest_type(&self) -> ManifestType {
        let path = self.resolved.as_ref().map(Url::path).unwrap_or(self.locator.as_str());
        detect_manifest_type(path, None)
    }

    pub fn is_hls(&self) -> bool {
        self.manifest_type() == ManifestType::Hls
    }
}

impl std::fmt::Display for StreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
