use anyhow::Context;

use crate::foundation::error::LayercastResult;
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::raster::buffer::PremulImage;

/// Decode any format the `image` crate recognizes into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> LayercastResult<PremulImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    PremulImage::from_raw(width, height, rgba8_premul)
}

/// Natural `(width, height)` read from the header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> LayercastResult<(u32, u32)> {
    let reader = image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .context("guess image format")?;
    let dims = reader.into_dimensions().context("read image dimensions")?;
    Ok(dims)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
