//! Image fetch, decode and resize into a [`PixelGrid`].
//!
//! Failures are classified at this boundary: an unrecognised or unsupported
//! encoding surfaces as [`ImageServiceError::UnsupportedFormat`] so callers
//! never inspect error text to pick a user-facing category.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use thiserror::Error;

use crate::glyph::PixelGrid;

/// Where a render's image came from. Token-sourced images are already
/// tightly cropped, which changes the default output width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSourceKind {
    Attachment,
    DirectUrl,
    Token,
}

impl ImageSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::DirectUrl => "direct_url",
            Self::Token => "token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub url: String,
    pub kind: ImageSourceKind,
}

/// Requested output height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetHeight {
    Exact(u32),
    /// Preserve the source aspect ratio for the requested width.
    Auto,
}

#[derive(Debug, Error)]
pub enum ImageServiceError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("image fetch failed: {0}")]
    Fetch(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image body exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("resized image would be {height} rows tall, limit is {max}")]
    TooTall { height: u32, max: u32 },
}

impl ImageServiceError {
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Self::UnsupportedFormat(_))
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "image_unsupported_format",
            Self::Fetch(_) => "image_fetch_failed",
            Self::Decode(_) => "image_decode_failed",
            Self::TooLarge { .. } => "image_too_large",
            Self::TooTall { .. } => "image_too_tall",
        }
    }
}

/// Fetches an image and resizes it to the target raster.
///
/// Implementations must reject with [`ImageServiceError::TooTall`] before
/// allocating the output when the resolved height exceeds `max_height`.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn fetch_and_resize(
        &self,
        source: &ImageSource,
        width: u32,
        height: TargetHeight,
        max_height: u32,
    ) -> Result<PixelGrid, ImageServiceError>;
}

#[derive(Debug, Clone)]
pub struct ImageServiceConfig {
    pub request_timeout_ms: u64,
    pub max_image_bytes: usize,
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_image_bytes: 8 * 1024 * 1024,
        }
    }
}

/// [`ImageService`] backed by `reqwest` for transfer and `image` for codecs.
#[derive(Debug, Clone)]
pub struct HttpImageService {
    http: reqwest::Client,
    max_image_bytes: usize,
}

impl HttpImageService {
    pub fn new(config: ImageServiceConfig) -> Result<Self, ImageServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .user_agent("emojicon")
            .build()
            .map_err(|error| {
                ImageServiceError::Fetch(format!("failed to create image http client: {error}"))
            })?;
        Ok(Self {
            http,
            max_image_bytes: config.max_image_bytes.max(1),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImageServiceError> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| ImageServiceError::Fetch(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageServiceError::Fetch(format!(
                "image host returned status {status}"
            )));
        }
        let limit = self.max_image_bytes;
        if response
            .content_length()
            .is_some_and(|length| length > limit as u64)
        {
            return Err(ImageServiceError::TooLarge { limit });
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|error| ImageServiceError::Fetch(error.to_string()))?
        {
            if body.len().saturating_add(chunk.len()) > limit {
                return Err(ImageServiceError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl ImageService for HttpImageService {
    #[tracing::instrument(level = "debug", skip(self), fields(url = %source.url))]
    async fn fetch_and_resize(
        &self,
        source: &ImageSource,
        width: u32,
        height: TargetHeight,
        max_height: u32,
    ) -> Result<PixelGrid, ImageServiceError> {
        let body = self.download(&source.url).await?;
        tracing::debug!(bytes = body.len(), "image downloaded");
        tokio::task::spawn_blocking(move || decode_and_resize(&body, width, height, max_height))
            .await
            .map_err(|error| ImageServiceError::Decode(format!("decode task failed: {error}")))?
    }
}

/// Decodes `bytes` and resizes to `width` by `height` with a bilinear filter.
///
/// The output height is resolved from the header dimensions first, so an
/// extreme aspect ratio is rejected without decoding or resizing anything.
pub fn decode_and_resize(
    bytes: &[u8],
    width: u32,
    height: TargetHeight,
    max_height: u32,
) -> Result<PixelGrid, ImageServiceError> {
    let format = image::guess_format(bytes).map_err(classify_image_error)?;
    let (source_width, source_height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(classify_image_error)?;
    let (width, height) = resolve_output_size(source_width, source_height, width, height)?;
    if height > max_height {
        return Err(ImageServiceError::TooTall {
            height,
            max: max_height,
        });
    }
    let decoded = decode(bytes, format)?;
    resize_to_grid(&decoded, width, height)
}

fn decode(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, ImageServiceError> {
    ImageReader::with_format(Cursor::new(bytes), format)
        .decode()
        .map_err(classify_image_error)
}

fn resolve_output_size(
    source_width: u32,
    source_height: u32,
    width: u32,
    height: TargetHeight,
) -> Result<(u32, u32), ImageServiceError> {
    if source_width == 0 || source_height == 0 {
        return Err(ImageServiceError::Decode(
            "image has zero width or height".to_string(),
        ));
    }
    let width = width.max(1);
    let height = match height {
        TargetHeight::Exact(value) => value.max(1),
        TargetHeight::Auto => auto_height(source_width, source_height, width),
    };
    Ok((width, height))
}

fn resize_to_grid(
    decoded: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<PixelGrid, ImageServiceError> {
    let resized = image::imageops::resize(&decoded.to_rgba8(), width, height, FilterType::Triangle);
    let pixels = resized.pixels().map(|pixel| pixel.0).collect::<Vec<_>>();
    PixelGrid::new(width, height, pixels).ok_or_else(|| {
        ImageServiceError::Decode("resized image has an unexpected sample count".to_string())
    })
}

fn auto_height(source_width: u32, source_height: u32, width: u32) -> u32 {
    let scaled = f64::from(source_height) * f64::from(width) / f64::from(source_width);
    // `as` saturates, so absurd ratios land on u32::MAX and fail the height limit.
    (scaled.round() as u32).max(1)
}

fn classify_image_error(error: ImageError) -> ImageServiceError {
    match error {
        ImageError::Unsupported(detail) => ImageServiceError::UnsupportedFormat(detail.to_string()),
        other => ImageServiceError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use httpmock::prelude::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    use super::{
        auto_height, decode_and_resize, HttpImageService, ImageService, ImageServiceConfig,
        ImageServiceError, ImageSource, ImageSourceKind, TargetHeight,
    };

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .expect("encode png");
        buffer.into_inner()
    }

    #[test]
    fn unit_auto_height_preserves_aspect_ratio() {
        assert_eq!(auto_height(100, 50, 25), 13);
        assert_eq!(auto_height(10, 10, 25), 25);
        assert_eq!(auto_height(1000, 1, 10), 1);
    }

    #[test]
    fn functional_decode_and_resize_exact_dimensions() {
        let bytes = png_bytes(40, 20, [10, 20, 30, 255]);
        let grid = decode_and_resize(&bytes, 8, TargetHeight::Exact(3), 200).expect("grid");
        assert_eq!((grid.width(), grid.height()), (8, 3));
        assert_eq!(grid.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn functional_decode_and_resize_auto_height() {
        let bytes = png_bytes(10, 40, [0, 0, 0, 0]);
        let grid = decode_and_resize(&bytes, 25, TargetHeight::Auto, 200).expect("grid");
        assert_eq!((grid.width(), grid.height()), (25, 100));
    }

    #[test]
    fn regression_unknown_bytes_are_unsupported_format() {
        let error = decode_and_resize(b"definitely not an image", 10, TargetHeight::Auto, 200)
            .expect_err("should fail");
        assert!(error.is_unsupported_format(), "{error}");
    }

    #[test]
    fn regression_tall_strip_is_rejected_before_resizing() {
        let bytes = png_bytes(1, 40_000, [0, 0, 255, 255]);
        let error = decode_and_resize(&bytes, 50, TargetHeight::Auto, 200)
            .expect_err("tall strip must be rejected");
        assert!(
            matches!(
                error,
                ImageServiceError::TooTall {
                    height: 2_000_000,
                    max: 200
                }
            ),
            "{error}"
        );
        assert_eq!(error.reason_code(), "image_too_tall");
    }

    #[test]
    fn regression_exact_height_over_limit_is_rejected() {
        let bytes = png_bytes(4, 4, [0, 0, 0, 255]);
        let error = decode_and_resize(&bytes, 10, TargetHeight::Exact(201), 200)
            .expect_err("exact height over limit");
        assert!(matches!(
            error,
            ImageServiceError::TooTall {
                height: 201,
                max: 200
            }
        ));
        let grid = decode_and_resize(&bytes, 10, TargetHeight::Exact(200), 200).expect("grid");
        assert_eq!(grid.height(), 200);
    }

    #[tokio::test]
    async fn integration_http_service_rejects_tall_strip() {
        let server = MockServer::start();
        let body = png_bytes(1, 40_000, [0, 255, 0, 255]);
        server.mock(|when, then| {
            when.method(GET).path("/strip.png");
            then.status(200).body(body.clone());
        });
        let service = HttpImageService::new(ImageServiceConfig::default()).expect("service");
        let source = ImageSource {
            url: server.url("/strip.png"),
            kind: ImageSourceKind::Attachment,
        };
        let error = service
            .fetch_and_resize(&source, 50, TargetHeight::Auto, 200)
            .await
            .expect_err("tall strip must be rejected");
        assert!(matches!(error, ImageServiceError::TooTall { max: 200, .. }), "{error}");
    }

    #[tokio::test]
    async fn integration_http_service_fetches_and_resizes() {
        let server = MockServer::start();
        let body = png_bytes(4, 4, [255, 0, 0, 255]);
        let mock = server.mock(|when, then| {
            when.method(GET).path("/cat.png");
            then.status(200)
                .header("content-type", "image/png")
                .body(body.clone());
        });
        let service = HttpImageService::new(ImageServiceConfig::default()).expect("service");
        let source = ImageSource {
            url: server.url("/cat.png"),
            kind: ImageSourceKind::DirectUrl,
        };
        let grid = service
            .fetch_and_resize(&source, 10, TargetHeight::Auto, 200)
            .await
            .expect("grid");
        mock.assert();
        assert_eq!((grid.width(), grid.height()), (10, 10));
    }

    #[tokio::test]
    async fn regression_http_service_reports_status_failures_as_fetch_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.png");
            then.status(404);
        });
        let service = HttpImageService::new(ImageServiceConfig::default()).expect("service");
        let source = ImageSource {
            url: server.url("/missing.png"),
            kind: ImageSourceKind::Attachment,
        };
        let error = service
            .fetch_and_resize(&source, 10, TargetHeight::Auto, 200)
            .await
            .expect_err("404 should fail");
        assert!(matches!(error, ImageServiceError::Fetch(_)), "{error}");
    }

    #[tokio::test]
    async fn regression_http_service_enforces_body_limit() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/huge.png");
            then.status(200).body(vec![0u8; 4096]);
        });
        let service = HttpImageService::new(ImageServiceConfig {
            max_image_bytes: 1024,
            ..ImageServiceConfig::default()
        })
        .expect("service");
        let source = ImageSource {
            url: server.url("/huge.png"),
            kind: ImageSourceKind::DirectUrl,
        };
        let error = service
            .fetch_and_resize(&source, 10, TargetHeight::Auto, 200)
            .await
            .expect_err("oversized body");
        assert!(matches!(error, ImageServiceError::TooLarge { limit: 1024 }));
    }
}
