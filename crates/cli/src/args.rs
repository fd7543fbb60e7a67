use std::path::PathBuf;

use clap::Parser;
use scanbatch_core::upload::{DateRange, UploadOptions};

/// scanbatch - upload scanned images for batch processing
#[derive(Parser, Debug)]
#[command(name = "scanbatch")]
#[command(version)]
#[command(about = "Upload scanned images, track processing, and fetch the results", long_about = None)]
pub struct Cli {
    /// Image files to upload (png, jpg, jpeg, gif)
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Server URL (overrides SCANBATCH_BASE_URL)
    #[arg(short = 'u', long = "url")]
    pub url: Option<String>,

    /// Sort images
    #[arg(long = "sort")]
    pub sort: bool,

    /// Fix image orientation
    #[arg(long = "fix-orientation")]
    pub fix_orientation: bool,

    /// Crop images to their detected content
    #[arg(long = "crop")]
    pub crop: bool,

    /// Draw detected contours (requires --crop)
    #[arg(long = "draw-contours", requires = "crop")]
    pub draw_contours: bool,

    /// Stamp dates onto images
    #[arg(long = "date")]
    pub date: bool,

    /// Prefix for output file names
    #[arg(long = "prefix")]
    pub prefix: Option<String>,

    /// Date format used when stamping
    #[arg(long = "date-format")]
    pub date_format: Option<String>,

    /// Date range, e.g. "01/01/1990 to 12/31/1999"
    #[arg(long = "date-range", value_parser = DateRange::parse)]
    pub date_range: Option<DateRange>,

    /// Human-verification token
    #[arg(long = "turnstile-token")]
    pub turnstile_token: Option<String>,

    /// Where to save the processed archive
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Do not download the archive, only print its URL
    #[arg(long = "no-download")]
    pub no_download: bool,
}

impl Cli {
    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            sort_images: self.sort,
            fix_orientation: self.fix_orientation,
            crop_images: self.crop,
            date_images: self.date,
            draw_contours: self.draw_contours,
            file_prefix: self.prefix.clone(),
            date_format: self.date_format.clone(),
            date_range: self.date_range,
        }
    }
}
