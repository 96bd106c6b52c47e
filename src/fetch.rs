//! Resolving external sources to bytes.
//!
//! Scene images reference their pixels by a source string: a `data:` URI, an
//! `http(s)://` URL or a root-relative asset path such as
//! `/tshirt-realistic.png`. The [`AssetFetcher`] trait is the only way the
//! codec, the garment renderer and the export compositor reach those bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::FetchError;

/// Bytes behind a source plus the content type the source declared.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAsset {
    pub bytes: Arc<[u8]>,
    pub content_type: Option<String>,
}

impl FetchedAsset {
    pub fn new(bytes: impl Into<Arc<[u8]>>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    /// The declared content type, or one sniffed from the bytes.
    pub fn effective_content_type(&self) -> Option<String> {
        self.content_type
            .clone()
            .or_else(|| sniff_content_type(&self.bytes))
    }
}

/// Guesses a MIME type from leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> Option<String> {
    if let Ok(format) = image::guess_format(bytes) {
        return Some(format.to_mime_type().to_string());
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let head = head.trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return Some("image/svg+xml".to_string());
    }
    None
}

/// File extension for a declared content type.
///
/// Takes the MIME subtype, drops parameters and any `+suffix`, and falls back
/// to `png` when nothing usable is declared.
///
/// ```
/// use garment_mockup::fetch::extension_for;
///
/// assert_eq!(extension_for(Some("image/jpeg")), "jpeg");
/// assert_eq!(extension_for(Some("image/svg+xml")), "svg");
/// assert_eq!(extension_for(None), "png");
/// ```
pub fn extension_for(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| ct.split_once('/'))
        .map(|(_, subtype)| subtype.split('+').next().unwrap_or_default().trim())
        .filter(|ext| !ext.is_empty())
        .unwrap_or("png")
        .to_ascii_lowercase()
}

// ============================================================================
// AssetFetcher
// ============================================================================

/// Resolves a source string to bytes.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, src: &str) -> Result<FetchedAsset, FetchError>;
}

/// Fetcher for `data:` URIs, HTTP(S) URLs and an on-disk asset directory.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    asset_root: Option<PathBuf>,
    #[cfg(feature = "http")]
    client: reqwest::Client,
}

impl DefaultFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves root-relative paths against `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn asset_root(&self) -> Option<&Path> {
        self.asset_root.as_deref()
    }

    fn local_path(&self, src: &str) -> Result<PathBuf, FetchError> {
        let root = self
            .asset_root
            .as_ref()
            .ok_or_else(|| FetchError::Unsupported(src.to_string()))?;
        let relative = Path::new(src.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(FetchError::Unsupported(src.to_string()));
        }
        Ok(root.join(relative))
    }

    async fn fetch_file(&self, src: &str) -> Result<FetchedAsset, FetchError> {
        let path = self.local_path(src)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let content_type = sniff_content_type(&bytes);
                Ok(FetchedAsset::new(bytes, content_type))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(src.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    #[cfg(feature = "http")]
    async fn fetch_http(&self, src: &str) -> Result<FetchedAsset, FetchError> {
        tracing::debug!("Fetching {}", src);

        let response = self.client.get(src).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                src: src.to_string(),
                status: status.as_u16(),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(FetchedAsset::new(bytes.to_vec(), content_type))
    }

    #[cfg(not(feature = "http"))]
    async fn fetch_http(&self, src: &str) -> Result<FetchedAsset, FetchError> {
        Err(FetchError::Unsupported(src.to_string()))
    }
}

#[async_trait]
impl AssetFetcher for DefaultFetcher {
    async fn fetch(&self, src: &str) -> Result<FetchedAsset, FetchError> {
        if src.starts_with("data:") {
            decode_data_uri(src)
        } else if src.starts_with("http://") || src.starts_with("https://") {
            self.fetch_http(src).await
        } else {
            self.fetch_file(src).await
        }
    }
}

/// Fetcher serving a fixed map of sources, for tests and batch use.
///
/// `data:` URIs are decoded inline so uploaded logos work without registration.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    assets: HashMap<String, FetchedAsset>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, asset: FetchedAsset) {
        self.assets.insert(src.into(), asset);
    }

    pub fn with(mut self, src: impl Into<String>, asset: FetchedAsset) -> Self {
        self.insert(src, asset);
        self
    }
}

#[async_trait]
impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, src: &str) -> Result<FetchedAsset, FetchError> {
        if let Some(asset) = self.assets.get(src) {
            return Ok(asset.clone());
        }
        if src.starts_with("data:") {
            return decode_data_uri(src);
        }
        Err(FetchError::NotFound(src.to_string()))
    }
}

// ============================================================================
// data: URIs
// ============================================================================

/// Decodes `data:[<mediatype>][;base64],<data>`.
pub fn decode_data_uri(uri: &str) -> Result<FetchedAsset, FetchError> {
    let invalid = || FetchError::InvalidDataUri(truncate(uri));

    let rest = uri.strip_prefix("data:").ok_or_else(invalid)?;
    let (header, payload) = rest.split_once(',').ok_or_else(invalid)?;

    let mut params = header.split(';');
    let media_type = params.next().map(str::trim).filter(|m| !m.is_empty());
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let cleaned: String = percent_decode(payload)
            .ok_or_else(invalid)?
            .into_iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(char::from)
            .collect();
        STANDARD.decode(cleaned).map_err(|_| invalid())?
    } else {
        percent_decode(payload).ok_or_else(invalid)?
    };

    let content_type = media_type
        .map(|m| m.to_ascii_lowercase())
        .or_else(|| Some("text/plain".to_string()));
    Ok(FetchedAsset::new(bytes, content_type))
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}
