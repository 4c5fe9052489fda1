use bytes::Bytes;
use image::ImageFormat;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Multipart field carrying the uploaded files (repeatable).
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the requested target format.
pub const FORMAT_FIELD: &str = "format";

/// A format a caller may ask for.
///
/// `Jpg` and `Jpeg` share a codec but stay distinct so the download name
/// echoes the token the caller actually sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    Jpg,
    Jpeg,
    WebP,
    Pdf,
}

impl TargetFormat {
    pub const ALL: [TargetFormat; 5] = [
        TargetFormat::Png,
        TargetFormat::Jpg,
        TargetFormat::Jpeg,
        TargetFormat::WebP,
        TargetFormat::Pdf,
    ];

    /// Lower-cased token as requested, used for the download file name.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Png => "png",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::WebP => "webp",
            TargetFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TargetFormat::Png => "image/png",
            TargetFormat::Jpg | TargetFormat::Jpeg => "image/jpeg",
            TargetFormat::WebP => "image/webp",
            TargetFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_lowercase();
        TargetFormat::ALL
            .into_iter()
            .find(|format| format.extension() == normalized)
            .ok_or(ConversionError::UnsupportedFormat { format: normalized })
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raster codec a single-image transcode encodes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterCodec {
    Png,
    Jpeg,
    WebP,
}

/// Image kinds that can be embedded as PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    /// Determines the real content type from the leading bytes, ignoring
    /// whatever name or type the client claimed.
    pub fn sniff(content: &[u8]) -> Result<Self, ConversionError> {
        match image::guess_format(content) {
            Ok(ImageFormat::Png) => Ok(ImageKind::Png),
            Ok(ImageFormat::Jpeg) => Ok(ImageKind::Jpeg),
            Ok(other) => Err(ConversionError::UnsupportedImageKind {
                mime: other.to_mime_type().to_string(),
            }),
            Err(_) => Err(ConversionError::NotAnImage),
        }
    }
}

/// A validated conversion request: at least one file and a known format.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub files: Vec<Bytes>,
    pub format: TargetFormat,
}

impl ConversionRequest {
    pub fn new(files: Vec<Bytes>, format: Option<&str>) -> Result<Self, ConversionError> {
        let format = match format {
            Some(token) if !token.is_empty() && !files.is_empty() => token,
            _ => return Err(ConversionError::MissingInput),
        };

        Ok(Self {
            files,
            format: format.parse()?,
        })
    }
}

/// Bytes produced for one request, consumed immediately by the response.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub content: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}

impl ConversionResult {
    pub fn file_name(&self) -> String {
        format!("converted.{}", self.extension)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EncoderSettings {
    pub jpeg_quality: u8, // 1-100
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self { jpeg_quality: 80 }
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Missing file(s) or format")]
    MissingInput,

    #[error("Unsupported format")]
    UnsupportedFormat { format: String },

    #[error("File size {actual} exceeds limit {limit}")]
    SizeLimit { actual: u64, limit: u64 },

    #[error("Too many files: at most {limit} per request")]
    TooManyFiles { limit: usize },

    #[error("PDF conversion only supports images")]
    NotAnImage,

    #[error("PDF conversion only supports PNG and JPEG images, got {mime}")]
    UnsupportedImageKind { mime: String },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid file content: {message}")]
    InvalidContent { message: String },

    #[error("Failed to read upload: {0}")]
    Multipart(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion task failed: {0}")]
    Blocking(String),
}
