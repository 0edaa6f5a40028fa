//! File payloads for multipart uploads

use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::error::ApiError;

/// Multipart field name the server reads the file from
pub const FILE_FIELD: &str = "file";

/// A file ready to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    /// Build from memory; content type is guessed from the file name
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();
        Self {
            filename,
            content_type,
            bytes,
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Single-part form with the file under `FILE_FIELD`
    pub(crate) fn into_form(self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes)
            .file_name(self.filename)
            .mime_str(&self.content_type)
            .map_err(|e| {
                ApiError::InvalidRequest(format!("bad content type {:?}: {}", self.content_type, e))
            })?;
        Ok(Form::new().part(FILE_FIELD, part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_is_guessed() {
        assert_eq!(UploadFile::new("photo.png", vec![]).content_type, "image/png");
        assert_eq!(
            UploadFile::new("report.pdf", vec![]).content_type,
            "application/pdf"
        );
        assert_eq!(
            UploadFile::new("blob", vec![1, 2]).content_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn test_bad_content_type_is_rejected() {
        let file = UploadFile::new("a.txt", b"hi".to_vec()).with_content_type("not a mime");
        assert!(matches!(file.into_form(), Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_from_path_reads_name_and_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "crack near column B4").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.filename, "notes.txt");
        assert_eq!(file.content_type, "text/plain");
        assert_eq!(file.bytes, b"crack near column B4");
    }
}
