//! Image Transform Stage
//!
//! Optional image compression. The stage never grows an image and never
//! fails an intake: any compressor error falls back to the original bytes.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chat_core::config::CompressionSettings;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{
    DynamicImage, ExtendedColorType, GenericImageView, ImageDecoder, ImageEncoder, ImageFormat,
    ImageReader,
};
use tracing::{debug, instrument, warn};

use crate::error::{TransformError, TransformResult};

/// Options handed to the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionOptions {
    /// Lossy encoding quality, 1-100
    pub quality: u8,
    /// Bound on the longer image side, in pixels
    pub max_width_or_height: u32,
}

impl From<&CompressionSettings> for CompressionOptions {
    fn from(settings: &CompressionSettings) -> Self {
        Self {
            quality: settings.quality.clamp(1, 100),
            max_width_or_height: settings.max_width_or_height.max(1),
        }
    }
}

/// Compressor output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedImage {
    pub data: Bytes,
    pub content_type: String,
}

/// Image compressor trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageCompressor: Send + Sync {
    /// Produce a new, ideally smaller, encoding of `data`
    async fn compress(
        &self,
        data: &Bytes,
        content_type: &str,
        options: &CompressionOptions,
    ) -> TransformResult<CompressedImage>;
}

/// Default compressor built on the `image` crate
///
/// Downsizes so the longer side fits `max_width_or_height` and re-encodes in
/// the source format. GIFs are left alone so animations survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCompressor;

impl RasterCompressor {
    pub fn new() -> Self {
        Self
    }

    fn compress_blocking(
        data: &[u8],
        content_type: &str,
        options: CompressionOptions,
    ) -> TransformResult<CompressedImage> {
        let format = match content_type {
            "image/jpeg" => ImageFormat::Jpeg,
            "image/png" => ImageFormat::Png,
            "image/webp" => ImageFormat::WebP,
            other => return Err(TransformError::Unsupported(other.to_string())),
        };

        let decoded = decode_upright(data, format)?;
        let resized = fit_within(decoded, options.max_width_or_height);
        let (width, height) = resized.dimensions();

        let mut out = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let rgb = resized.to_rgb8();
                JpegEncoder::new_with_quality(&mut Cursor::new(&mut out), options.quality)
                    .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| TransformError::Encode(e.to_string()))?;
            }
            ImageFormat::Png => {
                let rgba = resized.to_rgba8();
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive)
                    .write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| TransformError::Encode(e.to_string()))?;
            }
            _ => {
                let rgba = resized.to_rgba8();
                WebPEncoder::new_lossless(&mut out)
                    .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| TransformError::Encode(e.to_string()))?;
            }
        }

        Ok(CompressedImage {
            data: Bytes::from(out),
            content_type: content_type.to_string(),
        })
    }
}

#[async_trait]
impl ImageCompressor for RasterCompressor {
    async fn compress(
        &self,
        data: &Bytes,
        content_type: &str,
        options: &CompressionOptions,
    ) -> TransformResult<CompressedImage> {
        let data = data.clone();
        let content_type = content_type.to_string();
        let options = *options;

        tokio::task::spawn_blocking(move || Self::compress_blocking(&data, &content_type, options))
            .await
            .map_err(|e| TransformError::Task(e.to_string()))?
    }
}

/// Decode and apply the EXIF orientation
///
/// Re-encoded output carries no EXIF, so the rotation has to be baked into
/// the pixels before resizing.
fn decode_upright(data: &[u8], format: ImageFormat) -> TransformResult<DynamicImage> {
    let mut decoder = ImageReader::with_format(Cursor::new(data), format)
        .into_decoder()
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut image =
        DynamicImage::from_decoder(decoder).map_err(|e| TransformError::Decode(e.to_string()))?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Scale down so neither side exceeds `max_edge`, keeping the aspect ratio
fn fit_within(image: DynamicImage, max_edge: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_edge && height <= max_edge {
        return image;
    }
    image.resize(max_edge, max_edge, FilterType::Triangle)
}

/// Result of the transform stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub data: Bytes,
    pub content_type: String,
    pub compressed: bool,
}

impl TransformOutput {
    fn original(data: &Bytes, content_type: &str) -> Self {
        Self {
            data: data.clone(),
            content_type: content_type.to_string(),
            compressed: false,
        }
    }
}

/// Applies the compressor under the monotonic-size rule
pub struct TransformStage<C: ImageCompressor + ?Sized> {
    compressor: Arc<C>,
}

impl<C: ImageCompressor + ?Sized> Clone for TransformStage<C> {
    fn clone(&self) -> Self {
        Self {
            compressor: Arc::clone(&self.compressor),
        }
    }
}

impl<C: ImageCompressor + ?Sized> TransformStage<C> {
    pub fn new(compressor: Arc<C>) -> Self {
        Self { compressor }
    }

    /// Compress `data` if enabled and strictly smaller; otherwise keep it
    #[instrument(skip(self, data, settings), fields(size = data.len()))]
    pub async fn apply(
        &self,
        data: &Bytes,
        content_type: &str,
        settings: &CompressionSettings,
    ) -> TransformOutput {
        if !settings.enabled {
            return TransformOutput::original(data, content_type);
        }

        let options = CompressionOptions::from(settings);
        match self.compressor.compress(data, content_type, &options).await {
            Ok(out) if out.data.len() < data.len() => {
                debug!(
                    original = data.len(),
                    compressed = out.data.len(),
                    "Image compressed"
                );
                TransformOutput {
                    data: out.data,
                    content_type: out.content_type,
                    compressed: true,
                }
            }
            Ok(out) => {
                debug!(
                    original = data.len(),
                    compressed = out.data.len(),
                    "Compression did not shrink image, keeping original"
                );
                TransformOutput::original(data, content_type)
            }
            Err(e) => {
                warn!(error = %e, "Image compression failed, keeping original");
                TransformOutput::original(data, content_type)
            }
        }
    }
}
