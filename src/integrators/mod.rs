// Copyright @yucwang 2026

pub mod falsecolor;
pub mod furnace;
pub mod path;
pub mod preview;

use std::str::FromStr;

use crate::core::bvh::SceneBvh;
use crate::core::error::TraceError;
use crate::core::lights::LightTable;
use crate::core::rng::StreamRng;
use crate::core::scene::{eval_camera, Camera, Scene};
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::warp::sample_disk_concentric;

// What one estimator call produces. `hit` is true only for geometry;
// environment lookups still carry radiance but report `hit = false`.
// Albedo and normal are captured at the first bounce for the denoiser.
#[derive(Debug, Clone, Copy)]
pub struct TraceResult {
    pub radiance: Vector3f,
    pub hit: bool,
    pub albedo: Vector3f,
    pub normal: Vector3f,
}

impl Default for TraceResult {
    fn default() -> Self {
        Self {
            radiance: Vector3f::zeros(),
            hit: false,
            albedo: Vector3f::zeros(),
            normal: Vector3f::zeros(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerType {
    Path,
    PathDirect,
    PathMis,
    PathTest,
    LightSampling,
    Naive,
    Eyelight,
    Furnace,
    Falsecolor,
}

impl FromStr for SamplerType {
    type Err = TraceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "path" => Ok(SamplerType::Path),
            "pathdirect" => Ok(SamplerType::PathDirect),
            "pathmis" => Ok(SamplerType::PathMis),
            "pathtest" => Ok(SamplerType::PathTest),
            "lightsampling" => Ok(SamplerType::LightSampling),
            "naive" => Ok(SamplerType::Naive),
            "eyelight" => Ok(SamplerType::Eyelight),
            "furnace" => Ok(SamplerType::Furnace),
            "falsecolor" => Ok(SamplerType::Falsecolor),
            _ => Err(TraceError::UnknownSampler(name.to_string())),
        }
    }
}

impl SamplerType {
    // Whether the sampler draws from the light table at all; callers may
    // warn when a lit sampler runs on a scene without emitters.
    pub fn is_lit(self) -> bool {
        match self {
            SamplerType::Path
            | SamplerType::PathDirect
            | SamplerType::PathMis
            | SamplerType::PathTest
            | SamplerType::LightSampling
            | SamplerType::Naive
            | SamplerType::Furnace => true,
            SamplerType::Eyelight | SamplerType::Falsecolor => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FalsecolorType {
    Position,
    Normal,
    FrontFacing,
    GeoNormal,
    GeoFrontFacing,
    Texcoord,
    Color,
    Emission,
    Roughness,
    Opacity,
    Metallic,
    Delta,
    Element,
    Instance,
    Shape,
    Material,
    MaterialType,
    Highlight,
}

impl FromStr for FalsecolorType {
    type Err = TraceError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "position" => Ok(FalsecolorType::Position),
            "normal" => Ok(FalsecolorType::Normal),
            "frontfacing" => Ok(FalsecolorType::FrontFacing),
            "gnormal" => Ok(FalsecolorType::GeoNormal),
            "gfrontfacing" => Ok(FalsecolorType::GeoFrontFacing),
            "texcoord" => Ok(FalsecolorType::Texcoord),
            "color" => Ok(FalsecolorType::Color),
            "emission" => Ok(FalsecolorType::Emission),
            "roughness" => Ok(FalsecolorType::Roughness),
            "opacity" => Ok(FalsecolorType::Opacity),
            "metallic" => Ok(FalsecolorType::Metallic),
            "delta" => Ok(FalsecolorType::Delta),
            "element" => Ok(FalsecolorType::Element),
            "instance" => Ok(FalsecolorType::Instance),
            "shape" => Ok(FalsecolorType::Shape),
            "material" => Ok(FalsecolorType::Material),
            "mtype" => Ok(FalsecolorType::MaterialType),
            "highlight" => Ok(FalsecolorType::Highlight),
            _ => Err(TraceError::UnknownFalsecolor(name.to_string())),
        }
    }
}

pub const DEFAULT_SEED: u64 = 961748941;

// Everything the tracing core reads from configuration.
#[derive(Debug, Clone)]
pub struct TraceParams {
    pub camera: usize,
    pub resolution: usize,
    pub sampler: SamplerType,
    pub falsecolor: FalsecolorType,
    pub samples: usize,
    pub bounces: usize,
    pub clamp: Float,
    pub seed: u64,
    pub tentfilter: bool,
    pub envhidden: bool,
    pub nocaustics: bool,
    pub denoise: bool,
    pub batch: usize,
    // preview downscale ratio
    pub pratio: usize,
    pub noparallel: bool,
}

impl Default for TraceParams {
    fn default() -> Self {
        Self {
            camera: 0,
            resolution: 720,
            sampler: SamplerType::Path,
            falsecolor: FalsecolorType::Color,
            samples: 512,
            bounces: 8,
            clamp: 10.0,
            seed: DEFAULT_SEED,
            tentfilter: false,
            envhidden: false,
            nocaustics: false,
            denoise: false,
            batch: 1,
            pratio: 8,
            noparallel: false,
        }
    }
}

fn tent_warp(u: Float) -> Float {
    if u < 0.5 {
        (2.0 * u).sqrt() - 1.0
    } else {
        1.0 - (2.0 - 2.0 * u).sqrt()
    }
}

// Primary ray for a pixel: sub-pixel offset through the selected
// reconstruction filter, lens point through a concentric disk map.
pub fn sample_camera(
    camera: &Camera, ij: (usize, usize), resolution: (usize, usize),
    puv: &Vector2f, luv: &Vector2f, tent: bool,
) -> Ray3f {
    let fuv = if !tent {
        *puv
    } else {
        const WIDTH: Float = 2.0;
        const OFFSET: Float = 0.5;
        Vector2f::new(
            WIDTH * tent_warp(puv.x) + OFFSET,
            WIDTH * tent_warp(puv.y) + OFFSET,
        )
    };
    let uv = Vector2f::new(
        (ij.0 as Float + fuv.x) / resolution.0 as Float,
        (ij.1 as Float + fuv.y) / resolution.1 as Float,
    );
    eval_camera(camera, &uv, &sample_disk_concentric(luv))
}

// Runs the estimator selected by `params.sampler` on one camera ray.
pub fn trace_sampler(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    ray: &Ray3f, rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    match params.sampler {
        SamplerType::Path => path::trace_path(scene, bvh, lights, ray, rng, params),
        SamplerType::PathDirect => path::trace_pathdirect(scene, bvh, lights, ray, rng, params),
        SamplerType::PathMis => path::trace_pathmis(scene, bvh, lights, ray, rng, params),
        SamplerType::PathTest => path::trace_pathtest(scene, bvh, lights, ray, rng, params),
        SamplerType::LightSampling => {
            path::trace_lightsampling(scene, bvh, lights, ray, rng, params)
        }
        SamplerType::Naive => path::trace_naive(scene, bvh, lights, ray, rng, params),
        SamplerType::Eyelight => preview::trace_eyelight(scene, bvh, lights, ray, rng, params),
        SamplerType::Furnace => furnace::trace_furnace(scene, bvh, lights, ray, rng, params),
        SamplerType::Falsecolor => {
            falsecolor::trace_falsecolor(scene, bvh, lights, ray, rng, params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_names_roundtrip() {
        for name in [
            "path", "pathdirect", "pathmis", "pathtest", "lightsampling",
            "naive", "eyelight", "furnace", "falsecolor",
        ] {
            assert!(SamplerType::from_str(name).is_ok(), "{}", name);
        }
        assert!(SamplerType::from_str("bogus").is_err());
        assert!(FalsecolorType::from_str("gnormal").is_ok());
        assert!(FalsecolorType::from_str("bogus").is_err());
    }

    #[test]
    fn test_tent_warp_is_centered() {
        assert!((tent_warp(0.5)).abs() < 1e-6);
        assert!((tent_warp(0.0) + 1.0).abs() < 1e-6);
        assert!((tent_warp(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_box_filter_jitter_stays_in_pixel() {
        let camera = Camera::default();
        let center = sample_camera(
            &camera, (4, 4), (9, 9),
            &Vector2f::new(0.5, 0.5), &Vector2f::new(0.5, 0.5), false);
        // pixel (4,4) of a 9x9 grid is the image center
        assert!((center.dir() - Vector3f::new(0.0, 0.0, -1.0)).norm() < 1e-5);
    }
}
