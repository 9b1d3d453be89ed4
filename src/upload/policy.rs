//! Local checks and encodings for uploaded assets.
//!
//! Everything here runs before, or without, a network call.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::UploadPolicy;
use crate::error::{GuardError, GuardResult, ValidationError};
use crate::security::sanitize::sanitize_file_name;

/// An asset supplied by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk. Without an explicit type, it is guessed from
    /// the extension.
    pub async fn from_path(path: &Path, content_type: Option<&str>) -> GuardResult<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ValidationError::InvalidInput(format!("cannot read {}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ValidationError::InvalidInput(format!("{} is not a file", path.display())))?;
        let content_type = match content_type {
            Some(ct) => ct.to_string(),
            None => guess_content_type(&name)
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        Ok(Self::new(name, content_type, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Reject a file whose type or size the policy does not allow.
pub fn check(policy: &UploadPolicy, file: &UploadFile) -> Result<(), ValidationError> {
    if !policy.allowed_types.iter().any(|t| t == &file.content_type) {
        return Err(ValidationError::UnsupportedType {
            content_type: file.content_type.clone(),
            allowed: policy.allowed_types.clone(),
        });
    }
    if file.size() > policy.max_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            max_bytes: policy.max_bytes,
        });
    }
    Ok(())
}

/// MIME type implied by a file name's extension.
pub fn guess_content_type(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => return None,
    })
}

/// Owner-namespaced, collision-resistant object path.
pub fn object_path(owner: &str, file_name: &str, timestamp_ms: i64) -> String {
    format!("{}/{}_{}", owner, timestamp_ms, sanitize_file_name(file_name))
}

/// `data:` URI carrying the file inline.
pub fn data_uri(content_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

pub(crate) fn require_owner(owner: &str) -> GuardResult<()> {
    if owner.trim().is_empty() || owner.contains('/') {
        return Err(GuardError::Validation(ValidationError::InvalidInput(format!(
            "invalid owner id '{}'",
            owner
        ))));
    }
    Ok(())
}
