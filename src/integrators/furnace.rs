// Copyright @yucwang 2026

use crate::core::bvh::{intersect_scene, SceneBvh};
use crate::core::lights::LightTable;
use crate::core::rng::StreamRng;
use crate::core::scene::{
    eval_environment, eval_material_at, eval_position, eval_shading_normal_at, Scene,
};
use crate::integrators::{TraceParams, TraceResult};
use crate::materials::{
    eval_bsdfcos, eval_delta, eval_emission, sample_bsdfcos, sample_bsdfcos_pdf,
    sample_delta, sample_delta_pdf,
};
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

// Energy-conservation self check: after the first scattering event the
// path is closed against the environment directly, so a diffuse surface
// with albedo a under uniform emission L must read exactly a * L.
pub fn trace_furnace(
    scene: &Scene, bvh: &SceneBvh, _lights: &LightTable, ray_in: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    let mut radiance = Vector3f::zeros();
    let mut weight = Vector3f::new(1.0, 1.0, 1.0);
    let mut ray = *ray_in;
    let mut hit = false;
    let mut hit_albedo = Vector3f::zeros();
    let mut hit_normal = Vector3f::zeros();
    let mut opbounce = 0;
    let mut in_volume = false;

    let mut bounce = 0;
    while bounce < params.bounces {
        // close the path against the environment
        if bounce > 0 && !in_volume {
            radiance += weight.component_mul(&eval_environment(scene, &ray.dir()));
            break;
        }

        let intersection = match intersect_scene(bvh, scene, &ray, false) {
            Some(intersection) => intersection,
            None => {
                if bounce > 0 || !params.envhidden {
                    radiance += weight.component_mul(&eval_environment(scene, &ray.dir()));
                }
                break;
            }
        };

        let outgoing = -ray.dir();
        let instance = &scene.instances[intersection.instance];
        let element = intersection.element;
        let uv = intersection.uv;
        let position = eval_position(scene, instance, element, &uv);
        let normal = eval_shading_normal_at(scene, instance, element, &uv, &outgoing);
        let material = eval_material_at(scene, instance, element, &uv);

        if material.opacity < 1.0 && rng.next_f32() >= material.opacity {
            opbounce += 1;
            if opbounce > 128 {
                break;
            }
            ray = Ray3f::new(position + ray.dir() * 1e-2, ray.dir());
            continue;
        }

        if bounce == 0 {
            hit = true;
            hit_albedo = material.color;
            hit_normal = normal;
        }

        radiance += weight.component_mul(&eval_emission(&material, &normal, &outgoing));

        let incoming;
        if material.roughness != 0.0 {
            incoming = sample_bsdfcos(&material, &normal, &outgoing, rng.next_f32(), &rng.next_2f());
            if incoming == Vector3f::zeros() {
                break;
            }
            let pdf = sample_bsdfcos_pdf(&material, &normal, &outgoing, &incoming);
            if pdf <= 0.0 {
                break;
            }
            weight = weight.component_mul(&eval_bsdfcos(&material, &normal, &outgoing, &incoming)) / pdf;
        } else {
            incoming = sample_delta(&material, &normal, &outgoing, rng.next_f32());
            if incoming == Vector3f::zeros() {
                break;
            }
            let pdf = sample_delta_pdf(&material, &normal, &outgoing, &incoming);
            if pdf <= 0.0 {
                break;
            }
            weight = weight.component_mul(&eval_delta(&material, &normal, &outgoing, &incoming)) / pdf;
        }

        if weight == Vector3f::zeros()
            || !(weight.x.is_finite() && weight.y.is_finite() && weight.z.is_finite())
        {
            break;
        }

        if bounce > 3 {
            let rr_prob: Float = weight.max().min(0.99);
            if rng.next_f32() >= rr_prob {
                break;
            }
            weight /= rr_prob;
        }

        // flipping sides of a surface toggles the inside flag
        if normal.dot(&outgoing) * normal.dot(&incoming) < 0.0 {
            in_volume = !in_volume;
        }

        ray = Ray3f::new(position, incoming);
        bounce += 1;
    }

    TraceResult { radiance, hit, albedo: hit_albedo, normal: hit_normal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::lights::make_lights;
    use crate::core::presets::make_furnace;

    #[test]
    fn test_white_furnace_reads_albedo_exactly() {
        // diffuse sampling weight is the albedo for every sampled
        // direction, so each estimate is deterministic here
        let albedo = 0.75;
        let scene = make_furnace(albedo);
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams { bounces: 8, ..TraceParams::default() };

        let ray = Ray3f::new(
            Vector3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        let mut rng = StreamRng::new(44);
        for _ in 0..32 {
            let result = trace_furnace(&scene, &bvh, &lights, &ray, &mut rng, &params);
            assert!(result.hit);
            for c in 0..3 {
                assert!((result.radiance[c] - albedo).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_furnace_miss_sees_environment() {
        let scene = make_furnace(0.5);
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams::default();

        let ray = Ray3f::new(
            Vector3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, 1.0));
        let mut rng = StreamRng::new(4);
        let result = trace_furnace(&scene, &bvh, &lights, &ray, &mut rng, &params);
        assert!(!result.hit);
        assert!((result.radiance.x - 1.0).abs() < 1e-5);
    }
}
