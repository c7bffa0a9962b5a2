// Copyright @yucwang 2021

pub mod bvh;
pub mod error;
pub mod lights;
pub mod presets;
pub mod rng;
pub mod scene;
pub mod tangent_frame;
