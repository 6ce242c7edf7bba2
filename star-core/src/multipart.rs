use bytes::Bytes;

use crate::http::extract::Multipart;
use crate::model::RawValues;

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can occur while reading a `multipart/form-data` body.
#[derive(Debug)]
pub enum MultipartError {
    /// The body is not a well-formed multipart stream.
    Malformed(String),
    /// A part's data could not be read.
    ReadError { field: String, message: String },
    /// A text part is not valid UTF-8.
    InvalidText(String),
}

impl std::fmt::Display for MultipartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed multipart body: {msg}"),
            Self::ReadError { field, message } => {
                write!(f, "failed to read part '{field}': {message}")
            }
            Self::InvalidText(field) => write!(f, "part '{field}' is not valid UTF-8"),
        }
    }
}

impl std::error::Error for MultipartError {}

// ── UploadedFile ─────────────────────────────────────────────────────────────

/// A file received from a multipart form upload.
///
/// The data is a reference-counted [`Bytes`] handle: cloning an
/// `UploadedFile` never copies the upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The field name in the form.
    pub name: String,
    /// The original file name provided by the client, if any.
    pub file_name: Option<String>,
    /// The content type (MIME type) of the file, if provided.
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns the size of the file data in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Collection ───────────────────────────────────────────────────────────────

/// Consume an axum `Multipart` extractor and collect every part, in arrival
/// order. Parts carrying a file name are uploads; the rest are text.
pub async fn collect_parts(mut multipart: Multipart) -> Result<RawValues, MultipartError> {
    let mut values = RawValues::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| MultipartError::Malformed(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field.bytes().await.map_err(|e| MultipartError::ReadError {
            field: name.clone(),
            message: e.to_string(),
        })?;

        if file_name.is_some() {
            values.push_file(
                name.clone(),
                UploadedFile {
                    name,
                    file_name,
                    content_type,
                    data,
                },
            );
        } else {
            let text = String::from_utf8(data.to_vec())
                .map_err(|_| MultipartError::InvalidText(name.clone()))?;
            values.push_text(name, text);
        }
    }

    Ok(values)
}
