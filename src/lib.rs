//! Convertly
//!
//! Image conversion service: transcodes an uploaded image to PNG, JPEG or
//! WebP, or assembles uploaded PNG/JPEG images into a PDF with one page per
//! image. The `client` module holds the upload controller that drives it.

pub mod client;
pub mod config;
pub mod converter;
pub mod image_processor;
pub mod pdf_processor;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ServerConfig, UploadLimits};
pub use converter::Converter;
pub use types::*;
