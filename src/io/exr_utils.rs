/* Copyright 2020 @TwoCookingMice */

use crate::math::bitmap::Bitmap;
use crate::math::constants::Vector4f;

use exr::prelude::*;

// Write the render to an OpenEXR file, alpha included.
pub fn write_exr_to_file(image: &Bitmap<Vector4f>, file_path: &str) {
    log::info!("Starting writing openexr images: {}.", file_path);

    let width = image.width();
    let height = image.height();
    let write_result = write_rgba_file(file_path, width, height, |x, y| {
        let pixel = image[(x, y)];
        (pixel.x, pixel.y, pixel.z, pixel.w)
    });
    match write_result {
        Ok(()) => println!("EXR written to: {}.", file_path),
        Err(e) => println!("EXR written error: {}.", e.to_string()),
    }
}
