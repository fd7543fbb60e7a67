//! Multipart upload form.
//!
//! [`UploadForm`] owns the image bytes and the processing options for one
//! submission. The same form is posted twice (verification, then upload
//! start), so [`UploadForm::to_multipart`] builds a fresh
//! [`reqwest::multipart::Form`] on every call.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use scanbatch_core::error::CoreError;
use scanbatch_core::upload::{is_allowed_image, validate_total_size, UploadOptions};

/// Multipart field carrying the image files.
pub const FILES_FIELD: &str = "files[]";

/// Multipart field carrying the human-verification token.
pub const TURNSTILE_FIELD: &str = "cf-turnstile-response";

/// One image file queued for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    fn mime_type(&self) -> &'static str {
        let lower = self.file_name.to_ascii_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            "image/jpeg"
        } else {
            "application/octet-stream"
        }
    }
}

/// Files plus options for one submission.
#[derive(Debug, Clone)]
pub struct UploadForm {
    files: Vec<UploadFile>,
    options: UploadOptions,
    turnstile_token: Option<String>,
}

/// Errors raised while assembling an upload form.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// None of the given files has an accepted image extension.
    #[error("No supported image files were selected (accepted: png, jpg, jpeg, gif)")]
    NoFiles,

    /// Options or size limits were violated.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// A file could not be read from disk.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file name could not be determined for a path.
    #[error("Path has no usable file name: {0}")]
    FileName(PathBuf),
}

impl UploadForm {
    /// Build a form from in-memory files.
    ///
    /// Options are normalized, files with unsupported extensions are
    /// skipped, and the combined size is checked against the upload limit.
    pub fn new(
        files: Vec<UploadFile>,
        options: UploadOptions,
        turnstile_token: Option<String>,
    ) -> Result<Self, FormError> {
        let options = options.normalized()?;

        let files: Vec<UploadFile> = files
            .into_iter()
            .filter(|file| {
                let allowed = is_allowed_image(Path::new(&file.file_name));
                if !allowed {
                    tracing::warn!(file_name = %file.file_name, "Skipping unsupported file");
                }
                allowed
            })
            .collect();

        if files.is_empty() {
            return Err(FormError::NoFiles);
        }

        let total_bytes: u64 = files.iter().map(|f| f.bytes.len() as u64).sum();
        validate_total_size(total_bytes)?;

        let turnstile_token = turnstile_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        Ok(Self {
            files,
            options,
            turnstile_token,
        })
    }

    /// Read the given paths from disk and build a form.
    ///
    /// Unsupported extensions are skipped before reading.
    pub async fn from_paths(
        paths: &[PathBuf],
        options: UploadOptions,
        turnstile_token: Option<String>,
    ) -> Result<Self, FormError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            if !is_allowed_image(path) {
                tracing::warn!(path = %path.display(), "Skipping unsupported file");
                continue;
            }
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| FormError::FileName(path.clone()))?
                .to_string();
            let bytes = tokio::fs::read(path).await.map_err(|source| FormError::Read {
                path: path.clone(),
                source,
            })?;
            files.push(UploadFile::new(file_name, bytes));
        }
        Self::new(files, options, turnstile_token)
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.bytes.len() as u64).sum()
    }

    /// Text fields of the form, in the order they are sent.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let options = &self.options;
        let mut fields = vec![
            ("sort_images", options.sort_images.to_string()),
            ("fix_orientation", options.fix_orientation.to_string()),
            ("crop_images", options.crop_images.to_string()),
            ("date_images", options.date_images.to_string()),
            ("draw_contours", options.draw_contours.to_string()),
            (
                "file_prefix",
                options.file_prefix.clone().unwrap_or_default(),
            ),
            (
                "date_range",
                options
                    .date_range
                    .map(|range| range.to_string())
                    .unwrap_or_default(),
            ),
        ];
        if let Some(format) = &options.date_format {
            fields.push(("date_format", format.clone()));
        }
        if let Some(token) = &self.turnstile_token {
            fields.push((TURNSTILE_FIELD, token.clone()));
        }
        fields
    }

    /// Encode the form as `multipart/form-data`.
    pub fn to_multipart(&self) -> Result<Form, FormError> {
        let mut form = Form::new();
        for (name, value) in self.text_fields() {
            form = form.text(name, value);
        }
        for file in &self.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(file.mime_type())
                .map_err(|e| {
                    FormError::Invalid(CoreError::Validation(format!(
                        "Invalid MIME type for {}: {e}",
                        file.file_name
                    )))
                })?;
            form = form.part(FILES_FIELD, part);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanbatch_core::upload::DateRange;

    fn png(name: &str) -> UploadFile {
        UploadFile::new(name, vec![0x89, b'P', b'N', b'G'])
    }

    fn field<'a>(fields: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn skips_unsupported_files() {
        let form = UploadForm::new(
            vec![png("a.png"), UploadFile::new("notes.txt", vec![1]), png("b.JPG")],
            UploadOptions::default(),
            None,
        )
        .unwrap();
        let names: Vec<_> = form.files().iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.JPG"]);
    }

    #[test]
    fn rejects_empty_selection() {
        let result = UploadForm::new(
            vec![UploadFile::new("notes.txt", vec![1])],
            UploadOptions::default(),
            None,
        );
        assert!(matches!(result, Err(FormError::NoFiles)));
    }

    #[test]
    fn text_fields_encode_options() {
        let options = UploadOptions {
            sort_images: true,
            crop_images: true,
            draw_contours: true,
            file_prefix: Some("family".to_string()),
            date_format: Some("%Y".to_string()),
            date_range: Some(DateRange::parse("01/01/1980 to 12/31/1989").unwrap()),
            ..Default::default()
        };
        let form = UploadForm::new(vec![png("a.png")], options, Some(" tok ".to_string())).unwrap();
        let fields = form.text_fields();

        assert_eq!(field(&fields, "sort_images"), Some("true"));
        assert_eq!(field(&fields, "fix_orientation"), Some("false"));
        assert_eq!(field(&fields, "draw_contours"), Some("true"));
        assert_eq!(field(&fields, "file_prefix"), Some("family"));
        assert_eq!(field(&fields, "date_format"), Some("%Y"));
        assert_eq!(field(&fields, "date_range"), Some("01/01/1980 to 12/31/1989"));
        assert_eq!(field(&fields, TURNSTILE_FIELD), Some("tok"));
    }

    #[test]
    fn optional_fields_default_to_empty() {
        let form = UploadForm::new(vec![png("a.png")], UploadOptions::default(), None).unwrap();
        let fields = form.text_fields();

        assert_eq!(field(&fields, "file_prefix"), Some(""));
        assert_eq!(field(&fields, "date_range"), Some(""));
        assert_eq!(field(&fields, "date_format"), None);
        assert_eq!(field(&fields, TURNSTILE_FIELD), None);
    }

    #[test]
    fn contours_cleared_without_crop() {
        let options = UploadOptions {
            draw_contours: true,
            ..Default::default()
        };
        let form = UploadForm::new(vec![png("a.png")], options, None).unwrap();
        assert!(!form.options().draw_contours);
    }

    #[test]
    fn mime_types() {
        assert_eq!(png("a.PNG").mime_type(), "image/png");
        assert_eq!(UploadFile::new("a.jpeg", vec![]).mime_type(), "image/jpeg");
        assert_eq!(UploadFile::new("a.gif", vec![]).mime_type(), "image/gif");
    }

    #[test]
    fn multipart_builds_for_every_call() {
        let form = UploadForm::new(vec![png("a.png"), png("b.png")], UploadOptions::default(), None)
            .unwrap();
        let first = form.to_multipart().unwrap();
        let second = form.to_multipart().unwrap();
        assert_ne!(first.boundary(), "");
        assert_ne!(second.boundary(), "");
        assert_eq!(form.total_bytes(), 8);
    }

    #[tokio::test]
    async fn from_paths_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("scan.png");
        let other = dir.path().join("readme.md");
        std::fs::write(&image, b"image-bytes").unwrap();
        std::fs::write(&other, b"# nope").unwrap();

        let form = UploadForm::from_paths(&[image, other], UploadOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(form.files().len(), 1);
        assert_eq!(form.files()[0].file_name, "scan.png");
        assert_eq!(form.files()[0].bytes, b"image-bytes");
    }

    #[tokio::test]
    async fn from_paths_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.jpg");

        let result = UploadForm::from_paths(&[missing], UploadOptions::default(), None).await;
        assert!(matches!(result, Err(FormError::Read { .. })));
    }
}
