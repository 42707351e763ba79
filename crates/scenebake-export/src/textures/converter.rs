//! Image copy and resize
//!
//! Decodes with the `image` crate and re-encodes by destination extension.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat as ImgFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::textures::{TextureError, TextureResult};

/// Output image format, chosen from the destination extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format (lossless, good compression)
    Png,
    /// BMP format (lossless, no compression)
    Bmp,
    /// JPEG format (lossy, smaller size)
    Jpeg { quality: u8 },
}

impl ImageFormat {
    /// Format for `path`; `quality` in 0..=1 applies to JPEG only
    pub fn from_path(path: &Path, quality: f32) -> TextureResult<Self> {
        match extension(path).as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg {
                quality: jpeg_quality(quality),
            }),
            "png" => Ok(ImageFormat::Png),
            "bmp" => Ok(ImageFormat::Bmp),
            other => Err(TextureError::UnsupportedFormat(format!(
                "cannot write '.{other}' images ({})",
                path.display()
            ))),
        }
    }

    fn to_img_format(self) -> ImgFormat {
        match self {
            ImageFormat::Png => ImgFormat::Png,
            ImageFormat::Bmp => ImgFormat::Bmp,
            ImageFormat::Jpeg { .. } => ImgFormat::Jpeg,
        }
    }
}

/// Resize constraints for exported textures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResizeOptions {
    /// Resize once either side reaches this size; 0 disables
    pub max_size: u32,
    /// Longer side after a size-triggered resize
    pub target_size: u32,
    /// Round each side up to a power of two
    pub power_of_two: bool,
    /// Make both sides equal to the longer one
    pub square: bool,
    /// JPEG quality in 0..=1
    pub quality: f32,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            max_size: 0,
            target_size: 2048,
            power_of_two: false,
            square: false,
            quality: 0.9,
        }
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0) as i32).clamp(0, 100) as u8
}

fn exceeds_max_size(width: u32, height: u32, options: &ResizeOptions) -> bool {
    options.max_size != 0 && (options.max_size <= width || options.max_size <= height)
}

/// Whether an image of this size must be resampled
pub fn needs_resize(width: u32, height: u32, options: &ResizeOptions) -> bool {
    exceeds_max_size(width, height, options)
        || (options.power_of_two && !(width.is_power_of_two() && height.is_power_of_two()))
        || (options.square && width != height)
}

/// Output size: scale the longer side to `target_size` (when the size limit
/// triggered), then round up to powers of two, then square.
pub fn target_dimensions(width: u32, height: u32, options: &ResizeOptions) -> (u32, u32) {
    let (mut w, mut h) = (width, height);
    if exceeds_max_size(width, height, options) {
        let factor = options.target_size as f32 / width.max(height) as f32;
        w = (width as f32 * factor).floor() as u32;
        h = (height as f32 * factor).floor() as u32;
    }
    if options.power_of_two {
        w = w.next_power_of_two();
        h = h.next_power_of_two();
    }
    if options.square {
        let side = w.max(h);
        w = side;
        h = side;
    }
    (w, h)
}

fn is_tiff(path: &Path) -> bool {
    matches!(extension(path).as_str(), "tif" | "tiff")
}

/// 8-bit copy of `img`, keeping alpha only when present
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

fn write_image(img: &DynamicImage, dst: &Path, format: ImageFormat) -> TextureResult<()> {
    match format {
        ImageFormat::Jpeg { quality } => {
            let writer = BufWriter::new(File::create(dst)?);
            let encoder = JpegEncoder::new_with_quality(writer, quality);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Png | ImageFormat::Bmp => {
            to_8bit(img).save_with_format(dst, format.to_img_format())?;
        }
    }
    Ok(())
}

/// Copy `src` to `dst`, re-encoding by the destination extension and
/// resampling when `options` require it. TIFF sources are first flattened
/// into a temporary 8-bit PNG.
pub fn convert_or_resize_image(src: &Path, dst: &Path, options: &ResizeOptions) -> TextureResult<()> {
    let format = ImageFormat::from_path(dst, options.quality)?;

    if is_tiff(src) {
        let temp = tempfile::Builder::new()
            .prefix("scenebake-")
            .suffix(".png")
            .tempfile()?;
        to_8bit(&image::open(src)?).save_with_format(temp.path(), ImgFormat::Png)?;
        debug!(src = %src.display(), temp = %temp.path().display(), "flattened tiff");
        return convert_file(temp.path(), dst, format, options);
    }
    convert_file(src, dst, format, options)
}

fn convert_file(src: &Path, dst: &Path, format: ImageFormat, options: &ResizeOptions) -> TextureResult<()> {
    let (width, height) = image::image_dimensions(src)?;

    if !needs_resize(width, height, options) {
        if extension(src) == extension(dst) {
            std::fs::copy(src, dst)?;
        } else {
            write_image(&image::open(src)?, dst, format)?;
        }
        debug!(src = %src.display(), dst = %dst.display(), "copied texture");
        return Ok(());
    }

    let (w, h) = target_dimensions(width, height, options);
    if w == 0 || h == 0 {
        return Err(TextureError::InvalidDimensions { width: w, height: h });
    }
    let resized = image::open(src)?.resize_exact(w, h, FilterType::CatmullRom);
    write_image(&resized, dst, format)?;
    debug!(
        src = %src.display(),
        dst = %dst.display(),
        from = %format!("{width}x{height}"),
        to = %format!("{w}x{h}"),
        "resized texture"
    );
    Ok(())
}

/// True when the decoded image carries an alpha channel
pub fn has_alpha_channel(path: &Path) -> TextureResult<bool> {
    let img = image::open(path)?;
    Ok(img.color().channel_count() > 3)
}
