//! Upload option model, limits, and validation.
//!
//! Mirrors the processing switches the backend accepts alongside the image
//! files. Form encoding lives in `scanbatch-client`; this module only
//! decides what a valid set of options looks like.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// File extensions the backend will process (compared case-insensitively).
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Largest request body the backend accepts (200 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// Longest file prefix the client will send.
pub const MAX_FILE_PREFIX_LEN: usize = 64;

/// Date format used by the date range field (`MM/DD/YYYY`).
pub const DATE_RANGE_FORMAT: &str = "%m/%d/%Y";

/// Separator between the two dates of a range.
const DATE_RANGE_SEPARATOR: &str = " to ";

// ---------------------------------------------------------------------------
// File checks
// ---------------------------------------------------------------------------

/// `true` when the path has one of the [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Validate the combined size of all files in one upload.
pub fn validate_total_size(total_bytes: u64) -> Result<(), CoreError> {
    if total_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "Upload is {total_bytes} bytes, which exceeds the {MAX_UPLOAD_BYTES} byte limit"
        )));
    }
    Ok(())
}

/// Validate a file prefix and return it trimmed.
///
/// Rules:
/// - Must not be empty after trimming.
/// - Must not exceed [`MAX_FILE_PREFIX_LEN`] characters.
/// - Must not contain path separators.
pub fn validate_file_prefix(prefix: &str) -> Result<String, CoreError> {
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "File prefix must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_FILE_PREFIX_LEN {
        return Err(CoreError::Validation(format!(
            "File prefix must not exceed {MAX_FILE_PREFIX_LEN} characters"
        )));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(CoreError::Validation(format!(
            "File prefix must not contain path separators, got: '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Date range
// ---------------------------------------------------------------------------

/// Inclusive range of dates used to constrain date detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::Validation(format!(
                "Date range start {} is after its end {}",
                start.format(DATE_RANGE_FORMAT),
                end.format(DATE_RANGE_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `MM/DD/YYYY to MM/DD/YYYY`. A single date is a one-day range.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        let (start, end) = match raw.split_once(DATE_RANGE_SEPARATOR) {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (raw, raw),
        };
        Self::new(parse_date(start)?, parse_date(end)?)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{DATE_RANGE_SEPARATOR}{}",
            self.start.format(DATE_RANGE_FORMAT),
            self.end.format(DATE_RANGE_FORMAT)
        )
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw, DATE_RANGE_FORMAT).map_err(|e| {
        CoreError::Validation(format!("Invalid date '{raw}', expected MM/DD/YYYY: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Processing switches sent with every upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub sort_images: bool,
    pub fix_orientation: bool,
    pub crop_images: bool,
    pub date_images: bool,
    /// Outline detected photos; only meaningful together with `crop_images`.
    pub draw_contours: bool,
    pub file_prefix: Option<String>,
    pub date_format: Option<String>,
    pub date_range: Option<DateRange>,
}

impl UploadOptions {
    /// Apply the dependencies between switches and validate free-text fields.
    ///
    /// `draw_contours` is cleared when cropping is off; blank prefixes and
    /// date formats are dropped.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        if !self.crop_images {
            self.draw_contours = false;
        }
        self.file_prefix = match self.file_prefix.as_deref() {
            Some(prefix) if !prefix.trim().is_empty() => Some(validate_file_prefix(prefix)?),
            _ => None,
        };
        self.date_format = self
            .date_format
            .map(|format| format.trim().to_string())
            .filter(|format| !format.is_empty());
        Ok(self)
    }
}
