//! Error types for the design engine.
//!
//! Asset failures are recoverable and mostly surface as `warn!` events; only
//! archive assembly and invalid user input reach the caller as errors.

use thiserror::Error;

use crate::view::View;

/// Errors raised while resolving an external source to bytes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// The source string uses a scheme the fetcher cannot handle.
    #[error("unsupported source: {0}")]
    Unsupported(String),

    /// A `data:` URI could not be decoded.
    #[error("invalid data URI: {0}")]
    InvalidDataUri(String),

    /// The source is not known to the fetcher.
    #[error("source not found: {0}")]
    NotFound(String),

    /// Network request failed.
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status.
    #[error("request for {src} failed with status {status}")]
    Status {
        /// The requested source.
        src: String,
        /// HTTP status code.
        status: u16,
    },

    /// I/O error while reading a local asset.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch did not complete within its time budget.
    #[error("timed out fetching {0}")]
    Timeout(String),
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Errors raised while turning a record back into a scene object.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The record's type tag is not one of the known object kinds.
    #[error("unknown object type: {0}")]
    UnknownType(String),

    /// A field required by the record's type is absent.
    #[error("{kind} record is missing `{field}`")]
    MissingField {
        /// The record type tag.
        kind: &'static str,
        /// The missing field name.
        field: &'static str,
    },

    /// The external source could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetched bytes are not a decodable image.
    #[error("cannot decode {src}: {reason}")]
    Decode {
        /// The source that failed to decode.
        src: String,
        /// Decoder message.
        reason: String,
    },

    /// Icon markup could not be parsed.
    #[error("invalid icon markup: {0}")]
    Markup(String),
}

/// Errors returned by design-session operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DesignError {
    /// The garment color is not a 6-digit hex string.
    #[error("invalid garment color: {0}")]
    InvalidColor(String),

    /// The view name is not one of front/back/left/right.
    #[error("unknown view: {0}")]
    UnknownView(String),

    /// The operation needs a selected object and there is none.
    #[error("no object is selected")]
    NoSelection,

    /// The object id is not present on the surface.
    #[error("object {0} is not on the surface")]
    UnknownObject(String),

    /// A new object could not be created from its source.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reading or writing a design document failed.
    #[error("design document error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while loading configuration or documents.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesignError {
    /// Returns a short message suitable for display next to the editor.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self {
            Self::InvalidColor(_) => "Pick a color in #rrggbb form.",
            Self::UnknownView(_) => "That garment view does not exist.",
            Self::NoSelection => "Select an element first.",
            Self::UnknownObject(_) => "That element is no longer on the canvas.",
            Self::Codec(_) => "The element could not be loaded.",
            Self::Json(_) | Self::Io(_) => "The design file could not be read.",
        }
    }
}

impl From<FetchError> for DesignError {
    fn from(err: FetchError) -> Self {
        Self::Codec(CodecError::Fetch(err))
    }
}

/// Errors that abort an export.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// A view's garment asset was fetched but could not be used.
    #[error("cannot render {view} view: {reason}")]
    Render {
        /// The view that failed.
        view: View,
        /// What went wrong.
        reason: String,
    },

    /// Encoding a rendered view failed.
    #[error("image encoding error: {0}")]
    Encode(#[from] image::ImageError),

    /// Assembling the ZIP archive failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Writing the archive failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
