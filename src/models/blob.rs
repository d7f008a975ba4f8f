use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Tenant-scoped binary content, e.g. a provider logo.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub key: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Image field as posted by the admin UI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageUploadInput {
    pub bkey: String,
    pub upload: Option<UploadedFileInput>,
    pub remove: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadedFileInput {
    pub file_name: String,
    pub content_type: String,
    /// Base64 encoded file bytes.
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageUpload {
    pub bkey: Option<String>,
    pub upload: Option<UploadedFile>,
    pub remove: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl ImageUploadInput {
    pub fn decode(self) -> Result<ImageUpload, base64::DecodeError> {
        let upload = match self.upload {
            Some(file) if !file.content.is_empty() => Some(UploadedFile {
                file_name: file.file_name.trim().to_string(),
                content_type: file.content_type.trim().to_lowercase(),
                content: STANDARD.decode(file.content.trim())?,
            }),
            _ => None,
        };
        let bkey = Some(self.bkey.trim().to_string()).filter(|k| !k.is_empty());
        Ok(ImageUpload {
            bkey,
            upload,
            remove: self.remove,
        })
    }
}

impl UploadedFile {
    /// Content addressed key under `prefix`, so re-uploading the same file reuses the blob.
    pub fn blob_key(&self, prefix: &str) -> String {
        let digest = Sha256::digest(&self.content);
        let hash: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
        let name: String = self
            .file_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{}/{}-{}", prefix, hash, name)
    }
}
