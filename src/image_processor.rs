use crate::types::*;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::DynamicImage;

pub struct ImageProcessor {
    settings: EncoderSettings,
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self::with_settings(EncoderSettings::default())
    }

    pub fn with_settings(settings: EncoderSettings) -> Self {
        Self { settings }
    }

    /// Decode `content` (any format the image crate was built with) and
    /// re-encode it with `codec`.
    pub fn transcode(
        &self,
        content: &[u8],
        codec: RasterCodec,
    ) -> Result<Vec<u8>, ConversionError> {
        let img = image::load_from_memory(content)?;
        log::debug!("Decoded {}x{} {:?} image", img.width(), img.height(), img.color());

        let output = match codec {
            RasterCodec::Png => self.encode_png(&img)?,
            RasterCodec::Jpeg => self.encode_jpeg(&img)?,
            RasterCodec::WebP => self.encode_webp(&img)?,
        };

        log::info!("Transcoded {} bytes to {:?} ({} bytes)", content.len(), codec, output.len());
        Ok(output)
    }

    fn encode_png(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let mut output = Vec::new();
        img.write_with_encoder(PngEncoder::new(&mut output))?;
        Ok(output)
    }

    /// JPEG carries no alpha, so the image is flattened to RGB first.
    fn encode_jpeg(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let mut output = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut output, self.settings.jpeg_quality);
        rgb.write_with_encoder(encoder)?;
        Ok(output)
    }

    /// Lossless WebP; the encoder only takes 8-bit RGB(A).
    fn encode_webp(&self, img: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
        let img = if img.color().has_alpha() {
            DynamicImage::ImageRgba8(img.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(img.to_rgb8())
        };
        let mut output = Vec::new();
        img.write_with_encoder(WebPEncoder::new_lossless(&mut output))?;
        Ok(output)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use image::ImageFormat;

    fn decode(bytes: &[u8]) -> (ImageFormat, u32, u32) {
        let format = image::guess_format(bytes).unwrap();
        let img = image::load_from_memory(bytes).unwrap();
        (format, img.width(), img.height())
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let processor = ImageProcessor::new();
        let output = processor.transcode(&sample_jpeg(37, 21), RasterCodec::Png).unwrap();
        assert_eq!(decode(&output), (ImageFormat::Png, 37, 21));
    }

    #[test]
    fn converts_to_jpeg_with_alpha_flattened() {
        let processor = ImageProcessor::new();
        let output = processor.transcode(&sample_png_rgba(16, 9), RasterCodec::Jpeg).unwrap();
        assert_eq!(decode(&output), (ImageFormat::Jpeg, 16, 9));
    }

    #[test]
    fn converts_to_webp() {
        let processor = ImageProcessor::new();
        let output = processor.transcode(&sample_png(12, 30), RasterCodec::WebP).unwrap();
        assert_eq!(decode(&output), (ImageFormat::WebP, 12, 30));

        let output = processor.transcode(&sample_png_gray_alpha(5, 5), RasterCodec::WebP).unwrap();
        assert_eq!(decode(&output), (ImageFormat::WebP, 5, 5));
    }

    #[test]
    fn decodes_webp_input() {
        let processor = ImageProcessor::new();
        let output = processor.transcode(&sample_webp(8, 6), RasterCodec::Png).unwrap();
        assert_eq!(decode(&output), (ImageFormat::Png, 8, 6));
    }

    #[test]
    fn transcoding_is_deterministic() {
        let processor = ImageProcessor::new();
        let input = sample_png(20, 20);
        for codec in [RasterCodec::Png, RasterCodec::Jpeg, RasterCodec::WebP] {
            let first = processor.transcode(&input, codec).unwrap();
            let second = processor.transcode(&input, codec).unwrap();
            assert_eq!(first, second, "{:?} output differs between runs", codec);
        }
    }

    #[test]
    fn jpeg_quality_setting_is_applied() {
        let input = sample_png(64, 64);
        let low = ImageProcessor::with_settings(EncoderSettings { jpeg_quality: 10 })
            .transcode(&input, RasterCodec::Jpeg)
            .unwrap();
        let high = ImageProcessor::with_settings(EncoderSettings { jpeg_quality: 100 })
            .transcode(&input, RasterCodec::Jpeg)
            .unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn garbage_input_is_an_image_error() {
        let processor = ImageProcessor::new();
        let err = processor.transcode(b"not an image at all", RasterCodec::Png).unwrap_err();
        assert!(matches!(err, ConversionError::Image(_)));
    }
}
