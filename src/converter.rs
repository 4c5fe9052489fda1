use crate::image_processor::ImageProcessor;
use crate::pdf_processor::PdfProcessor;
use crate::types::*;

/// Stateless dispatcher from a validated request to converted bytes.
///
/// Shared between all workers; every call works on its own buffers.
pub struct Converter {
    image_processor: ImageProcessor,
    pdf_processor: PdfProcessor,
}

impl Converter {
    pub fn new() -> Self {
        Self::with_settings(EncoderSettings::default())
    }

    pub fn with_settings(settings: EncoderSettings) -> Self {
        Self {
            image_processor: ImageProcessor::with_settings(settings),
            pdf_processor: PdfProcessor::new(),
        }
    }

    /// Raster targets transcode only the first file; `pdf` turns every
    /// file into a page. Either the whole request succeeds or nothing is
    /// returned.
    pub fn convert(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        let format = request.format;
        let first = request.files.first().ok_or(ConversionError::MissingInput)?;

        let content = match format {
            TargetFormat::Png => self.transcode_first(request, RasterCodec::Png)?,
            TargetFormat::Jpg | TargetFormat::Jpeg => {
                self.transcode_first(request, RasterCodec::Jpeg)?
            }
            TargetFormat::WebP => self.transcode_first(request, RasterCodec::WebP)?,
            TargetFormat::Pdf => {
                log::info!("Assembling {} image(s) into a PDF", request.files.len());
                self.pdf_processor.create_pdf_from_images(&request.files)?
            }
        };

        let input_bytes: usize = match format {
            TargetFormat::Pdf => request.files.iter().map(|file| file.len()).sum(),
            _ => first.len(),
        };
        log::info!("Converted to {} ({} -> {} bytes)", format, input_bytes, content.len());

        Ok(ConversionResult {
            content,
            mime_type: format.mime_type(),
            extension: format.extension(),
        })
    }

    fn transcode_first(
        &self,
        request: &ConversionRequest,
        codec: RasterCodec,
    ) -> Result<Vec<u8>, ConversionError> {
        let (first, rest) = request
            .files
            .split_first()
            .ok_or(ConversionError::MissingInput)?;
        if !rest.is_empty() {
            log::info!(
                "Single-image target {}: using the first file, ignoring {} more",
                request.format,
                rest.len()
            );
        }
        self.image_processor.transcode(first, codec)
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use bytes::Bytes;

    fn request(files: Vec<Vec<u8>>, format: &str) -> ConversionRequest {
        ConversionRequest::new(files.into_iter().map(Bytes::from).collect(), Some(format)).unwrap()
    }

    #[test]
    fn raster_targets_resolve_mime_and_extension() {
        let converter = Converter::new();
        let cases = [
            ("png", "image/png", "png", image::ImageFormat::Png),
            ("JPG", "image/jpeg", "jpg", image::ImageFormat::Jpeg),
            ("jpeg", "image/jpeg", "jpeg", image::ImageFormat::Jpeg),
            ("WebP", "image/webp", "webp", image::ImageFormat::WebP),
        ];

        for (token, mime, extension, codec) in cases {
            let result = converter.convert(&request(vec![sample_png(10, 8)], token)).unwrap();
            assert_eq!(result.mime_type, mime);
            assert_eq!(result.extension, extension);
            assert_eq!(image::guess_format(&result.content).unwrap(), codec);
        }
    }

    #[test]
    fn extra_files_do_not_affect_raster_output() {
        let converter = Converter::new();
        let single = converter.convert(&request(vec![sample_png(12, 12)], "jpg")).unwrap();
        let many = converter
            .convert(&request(
                vec![sample_png(12, 12), sample_jpeg(30, 30), b"garbage".to_vec()],
                "jpg",
            ))
            .unwrap();
        assert_eq!(single.content, many.content);
    }

    #[test]
    fn pdf_target_uses_every_file() {
        let converter = Converter::new();
        let result = converter
            .convert(&request(vec![sample_png(3, 4), sample_jpeg(5, 6)], "PDF"))
            .unwrap();

        assert_eq!(result.mime_type, "application/pdf");
        assert_eq!(result.file_name(), "converted.pdf");
        let doc = lopdf::Document::load_mem(&result.content).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn pdf_target_fails_on_any_non_image() {
        let converter = Converter::new();
        let err = converter
            .convert(&request(vec![sample_png(3, 4), b"hello".to_vec()], "pdf"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::NotAnImage));
    }

    #[test]
    fn undecodable_first_file_fails_raster_target() {
        let converter = Converter::new();
        let err = converter
            .convert(&request(vec![b"hello".to_vec(), sample_png(3, 3)], "png"))
            .unwrap_err();
        assert!(matches!(err, ConversionError::Image(_)));
    }
}
