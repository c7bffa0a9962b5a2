// Copyright @yucwang 2026

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::core::bvh::{intersect_scene, SceneBvh};
use crate::core::lights::LightTable;
use crate::core::rng::StreamRng;
use crate::core::scene::{
    eval_element_normal, eval_material, eval_shading_normal, eval_shading_position,
    eval_texcoord, Scene,
};
use crate::integrators::{FalsecolorType, TraceParams, TraceResult, DEFAULT_SEED};
use crate::materials::is_delta;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

fn srgb_to_rgb_channel(c: Float) -> Float {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn srgb_to_rgb(c: &Vector3f) -> Vector3f {
    Vector3f::new(
        srgb_to_rgb_channel(c.x),
        srgb_to_rgb_channel(c.y),
        srgb_to_rgb_channel(c.z),
    )
}

// Stable pseudo-random palette for ids, bright enough to tell neighbors
// apart.
fn hashed_color(id: usize) -> Vector3f {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let mut rng = StreamRng::with_stream(DEFAULT_SEED, hasher.finish());
    let v = rng.next_3f();
    Vector3f::new(
        (0.5 + 0.5 * v.x).powf(2.2),
        (0.5 + 0.5 * v.y).powf(2.2),
        (0.5 + 0.5 * v.z).powf(2.2),
    )
}

// Debug visualization; a single intersection, no transport. Biased by
// construction.
pub fn trace_falsecolor(
    scene: &Scene, bvh: &SceneBvh, _lights: &LightTable, ray: &Ray3f,
    _rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    let intersection = match intersect_scene(bvh, scene, ray, false) {
        Some(intersection) => intersection,
        None => return TraceResult::default(),
    };

    let outgoing = -ray.dir();
    let position = eval_shading_position(scene, &intersection, &outgoing);
    let normal = eval_shading_normal(scene, &intersection, &outgoing);
    let instance = &scene.instances[intersection.instance];
    let gnormal = eval_element_normal(scene, instance, intersection.element);
    let texcoord = eval_texcoord(scene, instance, intersection.element, &intersection.uv);
    let mut material = eval_material(scene, &intersection);
    let delta = if is_delta(&material) { 1.0 } else { 0.0 };

    let result = match params.falsecolor {
        FalsecolorType::Position => position * 0.5 + Vector3f::new(0.5, 0.5, 0.5),
        FalsecolorType::Normal => normal * 0.5 + Vector3f::new(0.5, 0.5, 0.5),
        FalsecolorType::FrontFacing => {
            if normal.dot(&outgoing) > 0.0 {
                Vector3f::new(0.0, 1.0, 0.0)
            } else {
                Vector3f::new(1.0, 0.0, 0.0)
            }
        }
        FalsecolorType::GeoNormal => gnormal * 0.5 + Vector3f::new(0.5, 0.5, 0.5),
        FalsecolorType::GeoFrontFacing => {
            if gnormal.dot(&outgoing) > 0.0 {
                Vector3f::new(0.0, 1.0, 0.0)
            } else {
                Vector3f::new(1.0, 0.0, 0.0)
            }
        }
        FalsecolorType::Texcoord => {
            Vector3f::new(texcoord.x.rem_euclid(1.0), texcoord.y.rem_euclid(1.0), 0.0)
        }
        FalsecolorType::Color => material.color,
        FalsecolorType::Emission => material.emission,
        FalsecolorType::Roughness => {
            Vector3f::new(material.roughness, material.roughness, material.roughness)
        }
        FalsecolorType::Opacity => {
            Vector3f::new(material.opacity, material.opacity, material.opacity)
        }
        FalsecolorType::Metallic => {
            Vector3f::new(material.metallic, material.metallic, material.metallic)
        }
        FalsecolorType::Delta => Vector3f::new(delta, delta, delta),
        FalsecolorType::Element => hashed_color(intersection.element),
        FalsecolorType::Instance => hashed_color(intersection.instance),
        FalsecolorType::Shape => hashed_color(instance.shape),
        FalsecolorType::Material => hashed_color(instance.material),
        FalsecolorType::MaterialType => hashed_color(material.mtype as usize),
        FalsecolorType::Highlight => {
            if material.emission == Vector3f::zeros() {
                material.emission = Vector3f::new(0.2, 0.2, 0.2);
            }
            material.emission * normal.dot(&outgoing).abs()
        }
    };

    TraceResult {
        radiance: srgb_to_rgb(&result),
        hit: true,
        albedo: material.color,
        normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::lights::make_lights;
    use crate::core::presets::make_cornellbox;

    #[test]
    fn test_falsecolor_normal_mode() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams {
            falsecolor: FalsecolorType::Normal,
            ..TraceParams::default()
        };

        // back wall faces +z
        let ray = Ray3f::new(
            Vector3f::new(0.8, 1.6, 3.9), Vector3f::new(0.0, 0.0, -1.0));
        let mut rng = StreamRng::new(1);
        let result = trace_falsecolor(&scene, &bvh, &lights, &ray, &mut rng, &params);
        assert!(result.hit);
        assert!((result.radiance.z - 1.0).abs() < 1e-4);
        assert!(result.radiance.x < 0.3 && result.radiance.y < 0.3);
    }

    #[test]
    fn test_falsecolor_miss_is_empty() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams {
            falsecolor: FalsecolorType::Instance,
            ..TraceParams::default()
        };

        let ray = Ray3f::new(
            Vector3f::new(0.0, 1.0, 3.9), Vector3f::new(0.0, 0.0, 1.0));
        let mut rng = StreamRng::new(1);
        let result = trace_falsecolor(&scene, &bvh, &lights, &ray, &mut rng, &params);
        assert!(!result.hit);
        assert_eq!(result.radiance, Vector3f::zeros());
    }

    #[test]
    fn test_hashed_colors_are_stable_and_distinct() {
        let a = hashed_color(3);
        let b = hashed_color(3);
        let c = hashed_color(4);
        assert_eq!(a, b);
        assert!((a - c).norm() > 1e-3);
        for v in [a, c] {
            assert!(v.x >= 0.0 && v.x <= 1.0);
        }
    }
}
