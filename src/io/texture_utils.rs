// Copyright @yucwang 2026

use crate::core::error::TraceError;
use crate::core::scene::Texture;
use crate::math::constants::{Float, Vector4f};

fn srgb_to_linear(c: Float) -> Float {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

// Load an image file into an HDR texture. Float sources (EXR, Radiance
// HDR) are taken as linear; 8-bit sources are decoded from sRGB.
pub fn load_texture(path: &str) -> Result<Texture, TraceError> {
    let decoded = image::open(path).map_err(|e| TraceError::Texture {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let is_linear = matches!(
        decoded,
        image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_)
    );
    let rgba = decoded.to_rgba32f();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(TraceError::Texture {
            path: path.to_string(),
            reason: String::from("empty image"),
        });
    }

    let pixels = rgba
        .pixels()
        .map(|p| {
            if is_linear {
                Vector4f::new(p[0], p[1], p[2], p[3])
            } else {
                Vector4f::new(
                    srgb_to_linear(p[0]),
                    srgb_to_linear(p[1]),
                    srgb_to_linear(p[2]),
                    p[3],
                )
            }
        })
        .collect();

    log::info!("texture loaded from {}: {}x{}", path, width, height);
    Ok(Texture {
        width: width as usize,
        height: height as usize,
        pixels,
        nearest: false,
        clamp: false,
    })
}
