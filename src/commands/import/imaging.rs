use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageError, ImageFormat};

pub(crate) struct DecodedImage {
    pub image: DynamicImage,
    /// Format sniffed from the bytes, used when the extension names no encoder.
    pub source_format: Option<ImageFormat>,
}

impl DecodedImage {
    pub(crate) fn width(&self) -> u32 {
        self.image.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.image.height()
    }
}

pub(crate) fn decode_image(bytes: &[u8]) -> Result<DecodedImage, ImageError> {
    let source_format = image::guess_format(bytes).ok();
    let image = image::load_from_memory(bytes)?;

    Ok(DecodedImage {
        image,
        source_format,
    })
}

/// Dimensions after shrinking `(width, height)` to fit the box, keeping aspect ratio.
/// Images already inside the box keep their size.
pub(crate) fn fit_within(width: u32, height: u32, bounds: (u32, u32)) -> (u32, u32) {
    let (max_width, max_height) = bounds;
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let fitted_width = (f64::from(width) * scale).round() as u32;
    let fitted_height = (f64::from(height) * scale).round() as u32;

    (
        fitted_width.clamp(1, max_width),
        fitted_height.clamp(1, max_height),
    )
}

pub(crate) fn resize_to_fit(image: &DynamicImage, bounds: (u32, u32)) -> DynamicImage {
    let (width, height) = fit_within(image.width(), image.height(), bounds);
    if (width, height) == (image.width(), image.height()) {
        return image.clone();
    }
    image.resize_exact(width, height, FilterType::Lanczos3)
}

pub(crate) fn save_image(
    image: &DynamicImage,
    path: &Path,
    image_type: &str,
    source_format: Option<ImageFormat>,
) -> Result<()> {
    let format = ImageFormat::from_extension(image_type)
        .or(source_format)
        .with_context(|| format!("no encoder for image type {image_type}: {}", path.display()))?;

    encodable_for(image, format)
        .save_with_format(path, format)
        .with_context(|| format!("failed to save image: {}", path.display()))
}

/// Converts pixels to a color type the encoder for `format` accepts.
fn encodable_for(image: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    let color = image.color();
    let converted = match format {
        ImageFormat::Jpeg => match color {
            ColorType::L8 | ColorType::Rgb8 => None,
            _ => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        ImageFormat::Gif | ImageFormat::WebP | ImageFormat::Ico | ImageFormat::Qoi => match color {
            ColorType::Rgba8 => None,
            _ => Some(DynamicImage::ImageRgba8(image.to_rgba8())),
        },
        ImageFormat::Png => match color {
            ColorType::Rgb32F | ColorType::Rgba32F => {
                Some(DynamicImage::ImageRgba16(image.to_rgba16()))
            }
            _ => None,
        },
        ImageFormat::Pnm => match color {
            ColorType::L8 | ColorType::Rgb8 => None,
            _ => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
        ImageFormat::Farbfeld => match color {
            ColorType::Rgba16 => None,
            _ => Some(DynamicImage::ImageRgba16(image.to_rgba16())),
        },
        ImageFormat::Hdr => match color {
            ColorType::Rgb32F => None,
            _ => Some(DynamicImage::ImageRgb32F(image.to_rgb32f())),
        },
        ImageFormat::OpenExr => match color {
            ColorType::Rgb32F | ColorType::Rgba32F => None,
            _ => Some(DynamicImage::ImageRgba32F(image.to_rgba32f())),
        },
        // Bmp, Tga, Tiff and the rest take 8-bit gray, RGB or RGBA.
        _ => match color {
            ColorType::L8 | ColorType::Rgb8 | ColorType::Rgba8 => None,
            _ if color.has_alpha() => Some(DynamicImage::ImageRgba8(image.to_rgba8())),
            _ => Some(DynamicImage::ImageRgb8(image.to_rgb8())),
        },
    };

    match converted {
        Some(converted) => Cow::Owned(converted),
        None => Cow::Borrowed(image),
    }
}
