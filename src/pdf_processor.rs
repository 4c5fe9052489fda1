use crate::types::*;
use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use std::io::Write;

const IMAGE_NAME: &[u8] = b"Im1";

/// Sequential object id allocation for one document.
struct RefAllocator {
    next: i32,
}

impl RefAllocator {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn bump(&mut self) -> Ref {
        let id = Ref::new(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorModel {
    Gray,
    Rgb,
}

/// An image ready to be written as an image XObject.
struct EmbeddedImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
    filter: Filter,
    color: ColorModel,
    /// Flate-compressed 8-bit alpha, written as a soft mask.
    alpha: Option<Vec<u8>>,
}

/// Frame header fields of a baseline or progressive JPEG.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub bits_per_component: u8,
}

pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Builds a fresh document holding one page per image, in input order.
    ///
    /// Each page's MediaBox is the image's pixel size and the image fills
    /// it from the origin. The first file that is not a PNG or JPEG aborts
    /// the whole document.
    pub fn create_pdf_from_images(&self, files: &[Bytes]) -> Result<Vec<u8>, ConversionError> {
        let mut refs = RefAllocator::new();
        let catalog_id = refs.bump();
        let page_tree_id = refs.bump();

        let mut pdf = Pdf::new();
        let mut page_ids = Vec::with_capacity(files.len());

        for (index, file) in files.iter().enumerate() {
            let kind = ImageKind::sniff(file)?;
            let image = match kind {
                ImageKind::Png => self.embed_png(file)?,
                ImageKind::Jpeg => self.embed_jpeg(file)?,
            };
            log::debug!(
                "Page {}: {:?} {}x{} ({} bytes)",
                index + 1,
                kind,
                image.width,
                image.height,
                file.len()
            );

            let page_id = refs.bump();
            let content_id = refs.bump();
            let image_id = refs.bump();
            let mask_id = image.alpha.as_ref().map(|_| refs.bump());

            let width = image.width as f32;
            let height = image.height as f32;

            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, width, height));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources().x_objects().pair(Name(IMAGE_NAME), image_id);
            page.finish();

            let mut xobject = pdf.image_xobject(image_id, &image.data);
            xobject.filter(image.filter);
            xobject.width(image.width as i32);
            xobject.height(image.height as i32);
            match image.color {
                ColorModel::Gray => xobject.color_space().device_gray(),
                ColorModel::Rgb => xobject.color_space().device_rgb(),
            };
            xobject.bits_per_component(8);
            if let Some(mask_id) = mask_id {
                xobject.s_mask(mask_id);
            }
            xobject.finish();

            if let (Some(mask_id), Some(alpha)) = (mask_id, image.alpha.as_ref()) {
                let mut mask = pdf.image_xobject(mask_id, alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(image.width as i32);
                mask.height(image.height as i32);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask.finish();
            }

            let mut content = Content::new();
            content.save_state();
            content.transform([width, 0.0, 0.0, height, 0.0, 0.0]);
            content.x_object(Name(IMAGE_NAME));
            content.restore_state();
            pdf.stream(content_id, &content.finish());

            page_ids.push(page_id);
        }

        pdf.catalog(catalog_id).pages(page_tree_id);
        pdf.pages(page_tree_id)
            .kids(page_ids.iter().copied())
            .count(page_ids.len() as i32);

        let pdf_bytes = pdf.finish();
        log::info!("Created PDF with {} page(s): {} bytes", page_ids.len(), pdf_bytes.len());
        Ok(pdf_bytes)
    }

    /// Grey or RGB baseline JPEGs go in as-is; anything else is decoded.
    fn embed_jpeg(&self, content: &[u8]) -> Result<EmbeddedImage, ConversionError> {
        let header = read_jpeg_header(content)?;
        let color = match (header.components, header.bits_per_component) {
            (1, 8) => ColorModel::Gray,
            (3, 8) => ColorModel::Rgb,
            _ => {
                log::debug!(
                    "Re-encoding JPEG with {} component(s) at {} bits",
                    header.components,
                    header.bits_per_component
                );
                let img = image::load_from_memory_with_format(content, ImageFormat::Jpeg)?;
                return self.embed_decoded(&img);
            }
        };

        Ok(EmbeddedImage {
            width: header.width,
            height: header.height,
            data: content.to_vec(),
            filter: Filter::DctDecode,
            color,
            alpha: None,
        })
    }

    fn embed_png(&self, content: &[u8]) -> Result<EmbeddedImage, ConversionError> {
        let img = image::load_from_memory_with_format(content, ImageFormat::Png)?;
        self.embed_decoded(&img)
    }

    fn embed_decoded(&self, img: &DynamicImage) -> Result<EmbeddedImage, ConversionError> {
        let color_type = img.color();
        let (samples, color) = if color_type.has_color() {
            (img.to_rgb8().into_raw(), ColorModel::Rgb)
        } else {
            (img.to_luma8().into_raw(), ColorModel::Gray)
        };

        let alpha = if color_type.has_alpha() {
            let alpha: Vec<u8> = img.to_rgba8().pixels().map(|pixel| pixel.0[3]).collect();
            Some(deflate(&alpha)?)
        } else {
            None
        };

        Ok(EmbeddedImage {
            width: img.width(),
            height: img.height(),
            data: deflate(&samples)?,
            filter: Filter::FlateDecode,
            color,
            alpha,
        })
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ConversionError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Walks the marker segments up to the first start-of-frame.
pub fn read_jpeg_header(data: &[u8]) -> Result<JpegHeader, ConversionError> {
    let invalid = |message: &str| ConversionError::InvalidContent {
        message: format!("JPEG: {}", message),
    };

    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(invalid("missing start of image marker"));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(invalid("expected marker"));
        }
        let marker = data[pos + 1];
        match marker {
            // Fill byte before a marker.
            0xFF => {
                pos += 1;
                continue;
            }
            // Standalone markers carry no length.
            0x01 | 0xD0..=0xD8 => {
                pos += 2;
                continue;
            }
            0xD9 | 0xDA => break,
            _ => {}
        }

        let length = match data.get(pos + 2..pos + 4) {
            Some(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]) as usize,
            None => break,
        };
        if length < 2 {
            return Err(invalid("bad segment length"));
        }

        if is_start_of_frame(marker) {
            let segment = data
                .get(pos + 4..pos + 2 + length)
                .filter(|segment| segment.len() >= 6)
                .ok_or_else(|| invalid("truncated frame header"))?;
            let header = JpegHeader {
                bits_per_component: segment[0],
                height: u16::from_be_bytes([segment[1], segment[2]]) as u32,
                width: u16::from_be_bytes([segment[3], segment[4]]) as u32,
                components: segment[5],
            };
            if header.width == 0 || header.height == 0 {
                return Err(invalid("zero image dimension"));
            }
            return Ok(header);
        }

        pos += 2 + length;
    }

    Err(invalid("no frame header before image data"))
}

// SOF0..SOF15, minus DHT (C4), JPG (C8) and DAC (CC).
fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}
