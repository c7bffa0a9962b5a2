// Copyright 2020 @TwoCookingMice

pub mod aabb;
pub mod bitmap;
pub mod constants;
pub mod geometry;
pub mod ray;
pub mod transform;
pub mod warp;
