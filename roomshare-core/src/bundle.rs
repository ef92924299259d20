//! Multi-file bundle codec.
//!
//! A multi-file payload travels as a single body: a CBOR array of
//! `{ filename, data }` records, with file contents as CBOR byte strings.

use crate::content::FileEntry;
use crate::error::{codes, ClientError};

/// Encodes files into a bundle body.
pub fn encode(files: &[FileEntry]) -> Result<Vec<u8>, ClientError> {
    let mut buf = Vec::new();
    ciborium::into_writer(files, &mut buf).map_err(|e| {
        ClientError::validation(
            codes::COMPRESSION_FAILED,
            format!("failed to encode multi-file bundle: {}", e),
        )
    })?;
    Ok(buf)
}

/// Decodes a bundle body back into files, preserving order.
pub fn decode(data: &[u8]) -> Result<Vec<FileEntry>, ClientError> {
    ciborium::from_reader(data).map_err(|e| {
        ClientError::transport(
            codes::DECOMPRESSION_FAILED,
            format!("failed to decode multi-file bundle: {}", e),
        )
    })
}
