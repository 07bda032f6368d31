use std::io::Cursor;

use forge_contracts::sprite::{Sprite, SPRITE_MEDIA_TYPE, SPRITE_SIZE};
use forge_contracts::ForgeError;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Fits any decodable image onto a transparent 256x256 canvas.
///
/// The source is scaled down (never up) to fit, keeping its aspect ratio,
/// and centered. Output is lossless WebP so identical input always yields
/// identical bytes.
pub fn normalize(bytes: &[u8]) -> Result<Sprite, ForgeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|err| ForgeError::Decode(err.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(ForgeError::Decode(format!(
            "image has zero-sized dimensions {width}x{height}"
        )));
    }

    let rgba = decoded.to_rgba8();
    let (scaled_w, scaled_h) = fitted_dims(width, height);
    let scaled = if (scaled_w, scaled_h) == (width, height) {
        rgba
    } else {
        imageops::resize(&rgba, scaled_w, scaled_h, FilterType::Lanczos3)
    };

    let mut canvas = RgbaImage::from_pixel(SPRITE_SIZE, SPRITE_SIZE, Rgba([0, 0, 0, 0]));
    let x = (SPRITE_SIZE - scaled_w) / 2;
    let y = (SPRITE_SIZE - scaled_h) / 2;
    imageops::replace(&mut canvas, &scaled, i64::from(x), i64::from(y));

    let mut encoded = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::WebP)
        .map_err(|err| ForgeError::Encode(err.to_string()))?;

    Ok(Sprite::from_encoded(
        SPRITE_MEDIA_TYPE,
        SPRITE_SIZE,
        SPRITE_SIZE,
        &encoded,
    ))
}

/// `min(256/w, 256/h, 1)` applied to both sides, rounded, kept in 1..=256.
fn fitted_dims(width: u32, height: u32) -> (u32, u32) {
    let target = f64::from(SPRITE_SIZE);
    let scale = (target / f64::from(width))
        .min(target / f64::from(height))
        .min(1.0);
    if scale >= 1.0 {
        return (width, height);
    }
    let side = |value: u32| -> u32 {
        let scaled = (f64::from(value) * scale).round() as u32;
        scaled.clamp(1, SPRITE_SIZE)
    };
    (side(width), side(height))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

    use super::*;

    fn png(width: u32, height: u32, color: [u8; 4]) -> anyhow::Result<Vec<u8>> {
        let image = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn decode_sprite(sprite: &Sprite) -> anyhow::Result<DynamicImage> {
        Ok(image::load_from_memory(&sprite.payload()?)?)
    }

    #[test]
    fn fitted_dims_only_ever_shrinks() {
        assert_eq!(fitted_dims(512, 256), (256, 128));
        assert_eq!(fitted_dims(256, 1024), (64, 256));
        assert_eq!(fitted_dims(40, 20), (40, 20));
        assert_eq!(fitted_dims(10_000, 1), (256, 1));
    }

    #[test]
    fn wide_image_is_letterboxed_on_transparent_canvas() -> anyhow::Result<()> {
        let sprite = normalize(&png(512, 256, [255, 0, 0, 255])?)?;
        assert_eq!((sprite.width, sprite.height), (256, 256));
        assert!(sprite.data_uri.starts_with("data:image/webp;base64,"));

        let decoded = decode_sprite(&sprite)?;
        assert_eq!(decoded.dimensions(), (256, 256));
        assert_eq!(decoded.get_pixel(128, 10)[3], 0);
        assert_eq!(decoded.get_pixel(128, 250)[3], 0);
        let center = decoded.get_pixel(128, 128);
        assert!(center[0] > 250 && center[3] > 250);
        Ok(())
    }

    #[test]
    fn small_image_is_centered_without_upscaling() -> anyhow::Result<()> {
        let sprite = normalize(&png(10, 20, [0, 0, 255, 255])?)?;
        let decoded = decode_sprite(&sprite)?.to_rgba8();
        let opaque = decoded.pixels().filter(|pixel| pixel[3] > 0).count();
        assert_eq!(opaque, 10 * 20);
        // (256 - 10) / 2 = 123, (256 - 20) / 2 = 118
        assert_eq!(decoded.get_pixel(123, 118)[3], 255);
        assert_eq!(decoded.get_pixel(122, 118)[3], 0);
        assert_eq!(decoded.get_pixel(132, 137)[3], 255);
        assert_eq!(decoded.get_pixel(133, 137)[3], 0);
        Ok(())
    }

    #[test]
    fn same_input_gives_same_sprite() -> anyhow::Result<()> {
        let input = png(300, 200, [12, 34, 56, 255])?;
        assert_eq!(normalize(&input)?, normalize(&input)?);
        Ok(())
    }

    #[test]
    fn undecodable_bytes_fail_with_decode() {
        assert!(matches!(
            normalize(b"definitely not an image"),
            Err(ForgeError::Decode(_))
        ));
        assert!(matches!(normalize(&[]), Err(ForgeError::Decode(_))));
    }
}
