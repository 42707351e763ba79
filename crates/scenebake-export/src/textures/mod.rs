//! Texture copy, conversion and resizing
//!
//! Images referenced by materials are re-encoded next to the exported file,
//! optionally scaled down, squared or padded to power-of-two sizes.

mod converter;

pub use converter::{
    convert_or_resize_image, has_alpha_channel, needs_resize, target_dimensions, ImageFormat, ResizeOptions,
};

use thiserror::Error;

/// Texture conversion errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

pub type TextureResult<T> = Result<T, TextureError>;
