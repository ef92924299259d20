//! Shared content: the single payload a room holds.
//!
//! [`Content`] keeps the payload inside [`ContentData`], so the kind is always
//! derived from the payload itself. [`RawContent`] is the loosely tagged shape
//! used at the native boundary (integer kind plus one optional slot per
//! variant); it only converts into [`Content`] when the tag and the populated
//! slot agree.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::bundle;
use crate::error::{codes, ClientError};

/// MIME type used for clipboard text built by [`Content::text`].
pub const TEXT_MIME: &str = "text/plain";
/// MIME type used for bundles built by [`Content::multi_file`].
pub const BUNDLE_MIME: &str = "application/x-roomshare-bundle";

/// Content kind, encoded as `0 = File, 1 = Clipboard, 2 = MultiFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    File = 0,
    Clipboard = 1,
    MultiFile = 2,
}

impl ContentKind {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Name used in the content status document.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::File => "file",
            ContentKind::Clipboard => "clipboard",
            ContentKind::MultiFile => "multi_file",
        }
    }
}

impl TryFrom<i32> for ContentKind {
    type Error = ClientError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ContentKind::File),
            1 => Ok(ContentKind::Clipboard),
            2 => Ok(ContentKind::MultiFile),
            other => Err(ClientError::validation(
                codes::INVALID_CONTENT_KIND,
                format!("unknown content kind {}", other),
            )),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One file of a multi-file payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl FileEntry {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// The payload, inseparable from its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentData {
    File(Vec<u8>),
    Clipboard(String),
    MultiFile(Vec<FileEntry>),
}

impl ContentData {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentData::File(_) => ContentKind::File,
            ContentData::Clipboard(_) => ContentKind::Clipboard,
            ContentData::MultiFile(_) => ContentKind::MultiFile,
        }
    }

    /// Serializes the payload into the bytes sent as the content body.
    pub fn encode_body(&self) -> Result<Vec<u8>, ClientError> {
        match self {
            ContentData::File(bytes) => Ok(bytes.clone()),
            ContentData::Clipboard(text) => Ok(text.as_bytes().to_vec()),
            ContentData::MultiFile(files) => bundle::encode(files),
        }
    }

    /// Rebuilds a payload of the given kind from a content body.
    pub fn decode_body(kind: ContentKind, body: Vec<u8>) -> Result<Self, ClientError> {
        match kind {
            ContentKind::File => Ok(ContentData::File(body)),
            ContentKind::Clipboard => String::from_utf8(body)
                .map(ContentData::Clipboard)
                .map_err(|e| {
                    ClientError::invalid_response(format!("clipboard text is not UTF-8: {}", e))
                }),
            ContentKind::MultiFile => bundle::decode(&body).map(ContentData::MultiFile),
        }
    }
}

/// Content shared in a room, used for both upload and download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub device: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub name: String,
    pub mime: String,
    pub data: ContentData,
}

impl Content {
    pub fn new(
        device: impl Into<String>,
        name: impl Into<String>,
        mime: impl Into<String>,
        data: ContentData,
    ) -> Self {
        Self {
            device: device.into(),
            timestamp: crate::unix_now(),
            name: name.into(),
            mime: mime.into(),
            data,
        }
    }

    /// Clipboard text stamped with the device and the current time.
    pub fn text(device: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(device, "", TEXT_MIME, ContentData::Clipboard(text.into()))
    }

    /// A single file.
    pub fn file(
        device: impl Into<String>,
        name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(device, name, mime, ContentData::File(bytes.into()))
    }

    /// A set of files shipped as one bundle.
    pub fn multi_file(device: impl Into<String>, files: Vec<FileEntry>) -> Self {
        Self::new(device, "", BUNDLE_MIME, ContentData::MultiFile(files))
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn kind(&self) -> ContentKind {
        self.data.kind()
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            ContentData::Clipboard(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&[u8]> {
        match &self.data {
            ContentData::File(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&[FileEntry]> {
        match &self.data {
            ContentData::MultiFile(files) => Some(files),
            _ => None,
        }
    }

    /// Checks required fields before the content is transmitted.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.device.trim().is_empty() {
            return Err(ClientError::validation(
                codes::INVALID_REQUEST,
                "content device name must not be empty",
            ));
        }
        if self.mime.trim().is_empty() {
            return Err(ClientError::validation(
                codes::INVALID_REQUEST,
                "content mime type must not be empty",
            ));
        }
        match &self.data {
            ContentData::File(_) if self.name.trim().is_empty() => Err(ClientError::validation(
                codes::INVALID_REQUEST,
                "file content requires a name",
            )),
            ContentData::MultiFile(files) if files.is_empty() => Err(ClientError::validation(
                codes::INVALID_REQUEST,
                "multi-file content requires at least one file",
            )),
            ContentData::MultiFile(files) => {
                match files.iter().position(|f| f.filename.trim().is_empty()) {
                    Some(i) => Err(ClientError::validation(
                        codes::INVALID_REQUEST,
                        format!("file #{} of multi-file content has no filename", i),
                    )),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Splits the content into the loosely tagged boundary form.
    pub fn into_raw(self) -> RawContent {
        let mut raw = RawContent {
            device: self.device,
            timestamp: self.timestamp,
            kind: self.data.kind().as_i32(),
            name: self.name,
            mime: self.mime,
            file: None,
            clipboard: None,
            multi_file: None,
        };
        match self.data {
            ContentData::File(bytes) => raw.file = Some(bytes),
            ContentData::Clipboard(text) => raw.clipboard = Some(text),
            ContentData::MultiFile(files) => raw.multi_file = Some(files),
        }
        raw
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} at {}", self.kind(), self.device, self.timestamp)?;
        match &self.data {
            ContentData::File(bytes) => write!(f, ": {} ({} bytes)", self.name, bytes.len()),
            ContentData::Clipboard(text) => write!(f, ": {}", text),
            ContentData::MultiFile(files) => write!(f, ": {} file(s)", files.len()),
        }
    }
}

/// Native-boundary representation: an integer kind plus one slot per variant.
///
/// Exactly the slot selected by `kind` must be populated for the conversion
/// into [`Content`] to succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawContent {
    pub device: String,
    pub timestamp: u64,
    pub kind: i32,
    pub name: String,
    pub mime: String,
    pub file: Option<Vec<u8>>,
    pub clipboard: Option<String>,
    pub multi_file: Option<Vec<FileEntry>>,
}

impl TryFrom<RawContent> for Content {
    type Error = ClientError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        let kind = ContentKind::try_from(raw.kind)?;
        let data = match (kind, raw.file, raw.clipboard, raw.multi_file) {
            (ContentKind::File, Some(bytes), None, None) => ContentData::File(bytes),
            (ContentKind::Clipboard, None, Some(text), None) => ContentData::Clipboard(text),
            (ContentKind::MultiFile, None, None, Some(files)) => ContentData::MultiFile(files),
            (kind, file, clipboard, multi_file) => {
                let populated: Vec<&str> = [
                    file.as_ref().map(|_| "file"),
                    clipboard.as_ref().map(|_| "clipboard"),
                    multi_file.as_ref().map(|_| "multi_file"),
                ]
                .into_iter()
                .flatten()
                .collect();
                return Err(ClientError::validation(
                    codes::CONTENT_MISMATCH,
                    format!(
                        "content kind is {} but populated payload is [{}]",
                        kind,
                        populated.join(", ")
                    ),
                ));
            }
        };
        Ok(Content {
            device: raw.device,
            timestamp: raw.timestamp,
            name: raw.name,
            mime: raw.mime,
            data,
        })
    }
}

/// Lowercase hex SHA-256 of a content body.
pub fn content_hash(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
