use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgb, RgbImage};

use crate::error::{FetchError, WriteError};

use super::types::COVER_SIZE;

pub const JPEG_QUALITY: u8 = 90;

/// Downloads an image and hands back a normalized RGB square
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RgbImage, FetchError>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
    size: u32,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            size: COVER_SIZE,
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<RgbImage, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        tracing::debug!("Downloaded {} bytes from {}", bytes.len(), url);

        normalize(&bytes, self.size)
    }
}

/// Read and normalize an image already on disk
pub fn load_local(path: &Path, size: u32) -> Result<RgbImage, FetchError> {
    let bytes = std::fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    normalize(&bytes, size)
}

/// Decode raw bytes (format sniffed from content) and normalize
pub fn normalize(bytes: &[u8], size: u32) -> Result<RgbImage, FetchError> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| FetchError::Decode(image::ImageError::IoError(e)))?
        .decode()?;

    Ok(normalize_image(img, size))
}

/// Drop any alpha channel, then stretch to an exact `size`x`size` square
pub fn normalize_image(img: DynamicImage, size: u32) -> RgbImage {
    let rgb = flatten_alpha(img);

    if rgb.width() == size && rgb.height() == size {
        return rgb;
    }

    image::imageops::resize(&rgb, size, size, FilterType::Lanczos3)
}

/// Composite onto an opaque white background, producing 3 channels
pub fn flatten_alpha(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }

    let rgba = img.into_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    rgb
}

/// Baseline JPEG encoding of a normalized cover
pub fn encode_jpeg(img: &RgbImage) -> Result<Vec<u8>, WriteError> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    encoder.encode_image(img)?;
    Ok(buffer)
}
