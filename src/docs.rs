use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Document slots on a paper beyond the per-option map.
pub const DOCTYPE_SUBMISSION: i64 = 0;
pub const DOCTYPE_FINAL: i64 = -1;

/// A stored document. Content is addressed by its SHA-256 hash, so a blob
/// orphaned by a failed save can be reused safely by a later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub paper_storage_id: i64,
    pub paper_id: i64,
    pub document_type: i64,
    pub hash: String,
    pub mimetype: String,
    pub filename: Option<String>,
    pub size: i64,
    pub timestamp: i64,
}

/// A document arriving through the JSON importer, before it has a storage
/// row. Either a reference to existing content (docid/hash) or inline
/// base64 content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUpload {
    pub docid: Option<i64>,
    pub hash: Option<String>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub size: Option<i64>,
    pub content: Option<Vec<u8>>,
}

impl DocumentUpload {
    pub fn decode_content(content_base64: &str) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(content_base64.trim())
            .map_err(|e| Error::InvalidInput(format!("bad base64 document content: {e}")))
    }

    /// Resolve the upload's content hash, computing it for inline content.
    pub fn content_hash(&self) -> Option<String> {
        if let Some(content) = &self.content {
            Some(hash_content(content))
        } else {
            self.hash.clone()
        }
    }

    /// Mimetype, falling back to a filename-based guess.
    pub fn effective_mimetype(&self) -> String {
        if let Some(m) = &self.mimetype {
            if !m.is_empty() {
                return m.clone();
            }
        }
        self.filename
            .as_deref()
            .and_then(|f| mime_guess::from_path(f).first_raw())
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha2-{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_and_prefixed() {
        let h = hash_content(b"paper body");
        assert!(h.starts_with("sha2-"));
        assert_eq!(h, hash_content(b"paper body"));
        assert_ne!(h, hash_content(b"other body"));
    }

    #[test]
    fn mimetype_falls_back_to_filename_guess() {
        let up = DocumentUpload {
            filename: Some("paper.pdf".into()),
            ..Default::default()
        };
        assert_eq!(up.effective_mimetype(), "application/pdf");

        let up = DocumentUpload::default();
        assert_eq!(up.effective_mimetype(), "application/octet-stream");
    }

    #[test]
    fn inline_content_overrides_claimed_hash() {
        let up = DocumentUpload {
            hash: Some("sha2-bogus".into()),
            content: Some(b"real".to_vec()),
            ..Default::default()
        };
        assert_eq!(up.content_hash().unwrap(), hash_content(b"real"));
    }
}
